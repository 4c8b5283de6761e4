use once_cell::sync::Lazy;
use std::collections::HashMap;

/// 可互相换算的单位类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitClass {
    Length,
    Time,
    Frequency,
    Angle,
}

/// 单位 → (类别, 相对于该类别基准单位的倍数)。
static CONVERSIONS: Lazy<HashMap<&'static str, (UnitClass, f64)>> = Lazy::new(|| {
    use UnitClass::*;
    HashMap::from([
        ("mm", (Length, 1.0)),
        ("cm", (Length, 10.0)),
        ("in", (Length, 25.4)),
        ("pt", (Length, 25.4 / 72.0)),
        ("pc", (Length, 25.4 / 6.0)),
        ("ms", (Time, 1.0)),
        ("s", (Time, 1000.0)),
        ("Hz", (Frequency, 1.0)),
        ("kHz", (Frequency, 1000.0)),
        ("deg", (Angle, 1.0)),
        ("grad", (Angle, 0.9)),
        ("rad", (Angle, 180.0 / std::f64::consts::PI)),
        ("turn", (Angle, 360.0)),
    ])
});

/// 词法分析识别的单位，较长的写法排在前面以保证最长匹配。
pub const UNIT_PATTERN: &str =
    "vmin|vmax|dpcm|dppx|grad|turn|kHz|rem|deg|rad|dpi|em|ex|px|cm|mm|in|pt|pc|ms|Hz|vw|vh|ch|fr|s|%";

/// 把 `value` 从单位 `from` 换算到 `to`；二者不可换算时返回 `None`。
///
/// 同名单位总是可以换算，即使它不在换算表里（例如 `px`）。
pub fn convert(value: f64, from: &str, to: &str) -> Option<f64> {
    if from == to {
        return Some(value);
    }
    let (from_class, from_scale) = CONVERSIONS.get(from)?;
    let (to_class, to_scale) = CONVERSIONS.get(to)?;
    if from_class != to_class {
        return None;
    }
    Some(value * from_scale / to_scale)
}

/// 两个同类单位中倍数较大（更粗）的那个；不可比较时返回 `None`。
pub fn larger_unit<'a>(left: &'a str, right: &'a str) -> Option<&'a str> {
    if left == right {
        return Some(left);
    }
    let (left_class, left_scale) = CONVERSIONS.get(left)?;
    let (right_class, right_scale) = CONVERSIONS.get(right)?;
    if left_class != right_class {
        return None;
    }
    Some(if left_scale >= right_scale { left } else { right })
}
