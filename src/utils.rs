/// 输出数值时保留的有效数字位数。
const SIGNIFICANT_DIGITS: usize = 12;

/// 把内部浮点数转换成尽量短的 CSS 数值文本。
///
/// 先舍入到 12 位有效数字以消除二进制误差（`0.1 + 0.2` → `0.3`）；
/// 整数值省略小数部分；压缩模式下再去掉小数点前的 `0`（`0.3` → `.3`）。
pub fn format_number(value: f64, minify: bool) -> String {
    let value = round_significant(value);
    let value = if value == 0.0 { 0.0 } else { value };
    let formatted = if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    };
    if !minify {
        return formatted;
    }
    if let Some(rest) = formatted.strip_prefix("0.") {
        format!(".{rest}")
    } else if let Some(rest) = formatted.strip_prefix("-0.") {
        format!("-.{rest}")
    } else {
        formatted
    }
}

fn round_significant(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value)
        .parse()
        .unwrap_or(value)
}

/// 按 8 列制表位展开制表符，缩进宽度以展开后的空格数计算。
pub fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut result = String::with_capacity(line.len() + 8);
    let mut column = 0usize;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = 8 - column % 8;
            result.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            result.push(ch);
            column += 1;
        }
    }
    result
}

/// 按顶层逗号切分文本，括号与方括号内部的逗号保持原样。
pub fn split_top_level(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in input.chars() {
        match ch {
            '(' | '[' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    parts.push(current.trim().to_string());
    parts.retain(|part| !part.is_empty());
    parts
}

/// 保持相对缩进的辅助函数。
pub fn indent(level: usize) -> String {
    const INDENT: &str = "  ";
    (0..level).map(|_| INDENT).collect()
}
