use crate::error::{CcssError, CcssResult};
use std::str::Lines;

/// 手动或自动插入的源码终止标记。
pub const END_MARKER: &str = "__END__";

/// 逐行读取源码，去掉注释与空行，同时记录真实的物理行号。
///
/// 只能向前遍历一次；遇到未闭合的块注释时产出一次错误后结束。
pub struct LineScanner<'a> {
    lines: Lines<'a>,
    lineno: usize,
    emit_end_marker: bool,
    finished: bool,
}

impl<'a> LineScanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            lineno: 0,
            emit_end_marker: false,
            finished: false,
        }
    }

    /// 源码读完后额外产出一行 `__END__`，方便调用方统一收尾。
    pub fn with_end_marker(mut self) -> Self {
        self.emit_end_marker = true;
        self
    }

    fn read_raw(&mut self) -> Option<&'a str> {
        let raw = self.lines.next()?;
        self.lineno += 1;
        Some(raw)
    }

    /// 先整体去掉块注释（可能跨行），再去掉剩余文本中的行注释。
    fn next_logical(&mut self) -> Option<CcssResult<(usize, String)>> {
        let line = self.read_raw()?;
        let start = self.lineno;
        let mut stripped = String::new();
        let mut rest = line.to_string();
        loop {
            let Some(open) = rest.find("/*") else {
                stripped.push_str(&rest);
                let text = strip_line_comment(&stripped).trim_end().to_string();
                return Some(Ok((start, text)));
            };
            stripped.push_str(&rest[..open]);
            if let Some(close) = rest[open + 2..].find("*/") {
                rest = rest[open + 2 + close + 2..].to_string();
                continue;
            }
            // 跨行块注释：一直读到出现 `*/` 的那一行
            loop {
                match self.read_raw() {
                    Some(next) => {
                        if let Some(close) = next.find("*/") {
                            rest = next[close + 2..].to_string();
                            break;
                        }
                    }
                    None => {
                        return Some(Err(CcssError::parse(
                            self.lineno,
                            "missing end of multiline comment",
                        )));
                    }
                }
            }
        }
    }
}

impl<'a> Iterator for LineScanner<'a> {
    type Item = CcssResult<(usize, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            match self.next_logical() {
                Some(Ok((lineno, line))) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some(Ok((lineno, line)));
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None => {
                    self.finished = true;
                    if self.emit_end_marker {
                        return Some(Ok((self.lineno, END_MARKER.to_string())));
                    }
                    return None;
                }
            }
        }
    }
}

/// 去掉 `//` 行注释；紧跟在 `:` 后面的 `//`（例如 `http://`）不算注释。
fn strip_line_comment(line: &str) -> &str {
    let mut search_from = 0;
    while let Some(offset) = line[search_from..].find("//") {
        let idx = search_from + offset;
        if idx == 0 || !line[..idx].ends_with(':') {
            return &line[..idx];
        }
        search_from = idx + 2;
    }
    line
}
