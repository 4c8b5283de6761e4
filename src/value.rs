use crate::ast::BinOp;
use crate::color::{self, Amount, Color};
use crate::error::{CcssError, CcssResult};
use crate::sprite::{SpriteBox, SpriteMap};
use crate::units;
use crate::utils::format_number;
use std::rc::Rc;

/// 字符串重复结果的字节上限。
const MAX_REPEAT_BYTES: usize = 1 << 20;
/// `round()` 的小数位数范围，超出后 f64 已无可舍入的位。
const MAX_ROUND_PLACES: f64 = 15.0;

/// 求值后的运行时值。
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Dimension(f64, String),
    Color(Color),
    Rgba(Color, f64),
    String(String),
    Url(String),
    Backstring(String),
    List(Vec<Value>),
    Concat(Vec<Value>),
    SpriteMap(Rc<SpriteMap>),
    Sprite(Sprite),
}

/// 已经在精灵图中定位的子图。
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub name: String,
    pub bbox: SpriteBox,
    pub url: String,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Dimension(..) => "dimension",
            Value::Color(_) => "color",
            Value::Rgba(..) => "rgba",
            Value::String(_) => "string",
            Value::Url(_) => "url",
            Value::Backstring(_) => "backstring",
            Value::List(_) => "list",
            Value::Concat(_) => "concat",
            Value::SpriteMap(_) => "spritemap",
            Value::Sprite(_) => "sprite",
        }
    }

    /// 序列化为 CSS 文本。
    pub fn to_css(&self, minify: bool) -> String {
        match self {
            Value::Number(value) => format_number(*value, minify),
            Value::Dimension(value, unit) => format!("{}{unit}", format_number(*value, minify)),
            Value::Color(color) => color.to_css(minify),
            Value::Rgba(color, alpha) => {
                let sep = if minify { "," } else { ", " };
                format!(
                    "rgba({r}{sep}{g}{sep}{b}{sep}{a})",
                    r = color.r,
                    g = color.g,
                    b = color.b,
                    a = format_number(*alpha, minify)
                )
            }
            Value::String(text) => quote_if_needed(text),
            Value::Url(text) => format!("url({text})"),
            Value::Backstring(text) => text.clone(),
            Value::List(items) => join(items, if minify { "," } else { ", " }, minify),
            Value::Concat(items) => join(items, " ", minify),
            Value::SpriteMap(map) => format!("url({})", map.image_url.clone().unwrap_or_default()),
            Value::Sprite(sprite) => format!(
                "url({}) -{}px -{}px",
                sprite.url, sprite.bbox.x1, sprite.bbox.y1
            ),
        }
    }

    /// 字符串取原文，其余值取 CSS 文本；用于拼接与路径。
    pub fn text(&self, minify: bool) -> String {
        match self {
            Value::String(text) => text.clone(),
            other => other.to_css(minify),
        }
    }

    pub fn binary(self, op: BinOp, rhs: Value, line: usize, minify: bool) -> CcssResult<Value> {
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(arith(op, a, b, line)?)),
            (Value::Number(a), Value::Dimension(b, unit)) => {
                Ok(Value::Dimension(arith(op, a, b, line)?, unit))
            }
            (Value::Dimension(a, unit), Value::Number(b)) => {
                Ok(Value::Dimension(arith(op, a, b, line)?, unit))
            }
            (Value::Dimension(a, left), Value::Dimension(b, right))
                if matches!(op, BinOp::Add | BinOp::Sub) =>
            {
                dimension_sum(op, a, &left, b, &right, line)
            }
            (Value::Color(color), Value::Color(other)) => {
                color_arith(op, &color, other.channels().map(f64::from), line)
            }
            (Value::Color(color), Value::Number(amount)) => {
                color_arith(op, &color, [amount.trunc(); 3], line)
            }
            (Value::String(text), Value::Number(times)) if op == BinOp::Mul => {
                let count = times.floor().max(0.0);
                let size = (count <= MAX_REPEAT_BYTES as f64)
                    .then(|| (count as usize).checked_mul(text.len()))
                    .flatten()
                    .filter(|size| *size <= MAX_REPEAT_BYTES);
                match size {
                    Some(_) => Ok(Value::String(text.repeat(count as usize))),
                    None => Err(CcssError::eval(
                        line,
                        format!("string repetition by {count} is too large"),
                    )),
                }
            }
            (Value::Url(url), other) if op == BinOp::Add => {
                Ok(Value::Url(format!("{url}{}", other.text(minify))))
            }
            (Value::List(mut items), other) if op == BinOp::Add => {
                match other {
                    Value::List(more) => items.extend(more),
                    single => items.push(single),
                }
                Ok(Value::List(items))
            }
            (left, right) if op == BinOp::Add => Ok(Value::String(format!(
                "{}{}",
                left.text(minify),
                right.text(minify)
            ))),
            (left, right) => Err(CcssError::eval(
                line,
                format!(
                    "unsupported operand types for {op}: {} and {}",
                    left.type_name(),
                    right.type_name()
                ),
            )),
        }
    }

    pub fn negate(self, line: usize) -> CcssResult<Value> {
        match self {
            Value::Number(value) => Ok(Value::Number(-value)),
            Value::Dimension(value, unit) => Ok(Value::Dimension(-value, unit)),
            other => Err(CcssError::eval(
                line,
                format!("cannot negate {}", other.type_name()),
            )),
        }
    }

    /// 按值类型分派方法调用；`eval` 与 `sprite` 需要上下文，由求值器处理。
    pub fn call_method(
        self,
        method: &str,
        args: Vec<Value>,
        line: usize,
        minify: bool,
    ) -> CcssResult<Value> {
        match method {
            "string" => {
                return Ok(match self {
                    Value::String(_) => self,
                    other => Value::String(other.to_css(minify)),
                })
            }
            "type" => return Ok(Value::String(self.type_name().to_string())),
            _ => {}
        }
        let type_name = self.type_name();
        let result = match self {
            Value::Number(value) => numeric_method(method, value, &args, line)?.map(Value::Number),
            Value::Dimension(value, unit) => numeric_method(method, value, &args, line)?
                .map(|value| Value::Dimension(value, unit)),
            Value::String(text) => string_method(method, &text, &args, minify),
            Value::List(items) => match method {
                "length" => Some(Value::Number(items.len() as f64)),
                "join" => {
                    let delimiter = match args.first() {
                        Some(delimiter) => delimiter.text(minify),
                        None => " ".to_string(),
                    };
                    let parts: Vec<String> = items.iter().map(|item| item.text(minify)).collect();
                    Some(Value::String(parts.join(&delimiter)))
                }
                _ => None,
            },
            Value::Concat(items) if method == "list" => Some(Value::List(items)),
            Value::Url(url) if method == "length" => Some(Value::Number(url.chars().count() as f64)),
            Value::Color(color) => color_method(method, &color, &args, line)?,
            Value::Sprite(sprite) => sprite_method(method, &sprite),
            _ => None,
        };
        result.ok_or_else(|| {
            CcssError::eval(
                line,
                format!("{type_name} objects don't have a method called {method}"),
            )
        })
    }
}

fn arith(op: BinOp, a: f64, b: f64, line: usize) -> CcssResult<f64> {
    if matches!(op, BinOp::Div | BinOp::Mod) && b == 0.0 {
        return Err(CcssError::eval(line, "divide by zero"));
    }
    Ok(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Mod => a - b * (a / b).floor(),
    })
}

/// 同类单位相加减：换算到较大的单位后计算，结果使用较大的单位。
fn dimension_sum(
    op: BinOp,
    a: f64,
    left: &str,
    b: f64,
    right: &str,
    line: usize,
) -> CcssResult<Value> {
    let incompatible = || {
        CcssError::eval(
            line,
            format!("{left} and {right} are incompatible units"),
        )
    };
    let unit = units::larger_unit(left, right).ok_or_else(incompatible)?;
    let a = units::convert(a, left, unit).ok_or_else(incompatible)?;
    let b = units::convert(b, right, unit).ok_or_else(incompatible)?;
    Ok(Value::Dimension(arith(op, a, b, line)?, unit.to_string()))
}

fn color_arith(op: BinOp, color: &Color, rhs: [f64; 3], line: usize) -> CcssResult<Value> {
    let mut channels = [0.0; 3];
    for ((slot, left), right) in channels.iter_mut().zip(color.channels()).zip(rhs) {
        let left = f64::from(left);
        *slot = match op {
            BinOp::Div => arith(op, left, right, line)?.floor(),
            _ => arith(op, left, right, line)?,
        };
    }
    Ok(Value::Color(Color::from_channels(channels)))
}

fn numeric_method(method: &str, value: f64, args: &[Value], line: usize) -> CcssResult<Option<f64>> {
    Ok(match method {
        "abs" => Some(value.abs()),
        "round" => {
            let places = match args.first() {
                None => 0.0,
                Some(Value::Number(places)) => {
                    places.trunc().clamp(-MAX_ROUND_PLACES, MAX_ROUND_PLACES)
                }
                Some(other) => {
                    return Err(CcssError::eval(
                        line,
                        format!("round() expects a number, got {}", other.type_name()),
                    ))
                }
            };
            let factor = 10f64.powf(places);
            Some((value * factor).round() / factor)
        }
        _ => None,
    })
}

fn string_method(method: &str, text: &str, args: &[Value], minify: bool) -> Option<Value> {
    Some(match method {
        "length" => Value::Number(text.chars().count() as f64),
        "upper" => Value::String(text.to_uppercase()),
        "lower" => Value::String(text.to_lowercase()),
        "strip" => Value::String(text.trim().to_string()),
        "split" => {
            let parts: Vec<Value> = match args.first() {
                Some(delimiter) => text
                    .split(delimiter.text(minify).as_str())
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
                None => text
                    .split_whitespace()
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            };
            Value::List(parts)
        }
        _ => return None,
    })
}

fn color_method(
    method: &str,
    color: &Color,
    args: &[Value],
    line: usize,
) -> CcssResult<Option<Value>> {
    let result = match method {
        "brighten" => color::brighten(color, lightness_amount(args.first(), line)?),
        "darken" => color::darken(color, lightness_amount(args.first(), line)?),
        "tint" => match args.first() {
            None => color.clone(),
            Some(value) => color::tint(color, scalar(value, line)?),
        },
        "shade" => {
            let (lightness, saturation) = match args {
                [] => return Ok(Some(Value::Color(color.clone()))),
                [Value::List(pair)] if pair.len() == 2 => {
                    (scalar(&pair[0], line)?, scalar(&pair[1], line)?)
                }
                [single] => (scalar(single, line)?, 0.0),
                [first, second] => (scalar(first, line)?, scalar(second, line)?),
                _ => {
                    return Err(CcssError::eval(
                        line,
                        "shade() takes a lightness and an optional saturation",
                    ))
                }
            };
            color::shade(color, lightness, saturation)
        }
        "mix" => {
            let (other, percent) = match args {
                [Value::Color(other), amount] | [amount, Value::Color(other)] => {
                    (other, scalar(amount, line)?)
                }
                [_, _] => {
                    return Err(CcssError::eval(
                        line,
                        "mix() needs a color and a percentage",
                    ))
                }
                _ => {
                    return Err(CcssError::eval(
                        line,
                        format!("mix() takes exactly 2 arguments ({} given)", args.len()),
                    ))
                }
            };
            color::mix(color, other, percent)
        }
        "hex" => color.to_literal(),
        _ => return Ok(None),
    };
    Ok(Some(Value::Color(result)))
}

/// brighten/darken 的参数：缺省 10%，百分比按比例，裸数值按绝对值。
fn lightness_amount(arg: Option<&Value>, line: usize) -> CcssResult<Amount> {
    match arg {
        None => Ok(Amount::Percent(10.0)),
        Some(Value::Number(value)) => Ok(Amount::Absolute(*value)),
        Some(Value::Dimension(value, unit)) if unit == "%" => Ok(Amount::Percent(*value)),
        Some(Value::Dimension(_, unit)) => {
            Err(CcssError::eval(line, format!("invalid unit '{unit}'")))
        }
        Some(other) => Err(CcssError::eval(
            line,
            format!("expected a number or percentage, got {}", other.type_name()),
        )),
    }
}

fn scalar(value: &Value, line: usize) -> CcssResult<f64> {
    match value {
        Value::Number(value) => Ok(*value),
        Value::Dimension(value, unit) if unit == "%" => Ok(*value),
        Value::Dimension(_, unit) => Err(CcssError::eval(line, format!("invalid unit '{unit}'"))),
        other => Err(CcssError::eval(
            line,
            format!("expected a number or percentage, got {}", other.type_name()),
        )),
    }
}

fn sprite_method(method: &str, sprite: &Sprite) -> Option<Value> {
    let px = |value: i64| Value::Dimension(value as f64, "px".to_string());
    let bbox = sprite.bbox;
    Some(match method {
        "url" => Value::String(format!("url({})", sprite.url)),
        "position" => Value::Concat(vec![px(bbox.x1), px(bbox.y1), px(bbox.x2), px(bbox.y2)]),
        "width" => px(bbox.width()),
        "height" => px(bbox.height()),
        "x1" => px(bbox.x1),
        "y1" => px(bbox.y1),
        "x2" => px(bbox.x2),
        "y2" => px(bbox.y2),
        _ => return None,
    })
}

fn join(items: &[Value], separator: &str, minify: bool) -> String {
    items
        .iter()
        .map(|item| item.to_css(minify))
        .collect::<Vec<_>>()
        .join(separator)
}

/// 含空白的字符串需要加引号才能保持为单个 CSS 值。
fn quote_if_needed(text: &str) -> String {
    if !text.chars().any(char::is_whitespace) {
        return text.to_string();
    }
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for ch in text.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(value: f64) -> Value {
        Value::Dimension(value, "px".into())
    }

    fn apply(op: BinOp, left: Value, right: Value) -> CcssResult<Value> {
        left.binary(op, right, 1, false)
    }

    #[test]
    fn number_and_dimension_arithmetic() {
        assert_eq!(apply(BinOp::Add, px(2.0), px(2.0)).unwrap(), px(4.0));
        assert_eq!(apply(BinOp::Add, px(1.0), Value::Number(1.0)).unwrap(), px(2.0));
        assert_eq!(apply(BinOp::Add, Value::Number(5.0), px(5.0)).unwrap(), px(10.0));
        assert_eq!(apply(BinOp::Sub, px(4.0), px(5.0)).unwrap(), px(-1.0));
        assert_eq!(
            apply(BinOp::Mod, Value::Number(-7.0), Value::Number(3.0)).unwrap(),
            Value::Number(2.0)
        );
    }

    #[test]
    fn compatible_units_convert_to_the_larger_one() {
        let cm = |v: f64| Value::Dimension(v, "cm".into());
        let mm = |v: f64| Value::Dimension(v, "mm".into());
        assert_eq!(apply(BinOp::Add, cm(1.0), mm(10.0)).unwrap(), cm(2.0));
        assert_eq!(apply(BinOp::Sub, mm(30.0), cm(1.0)).unwrap(), cm(2.0));
    }

    #[test]
    fn incompatible_units_fail() {
        let err = apply(BinOp::Add, px(1.0), Value::Dimension(1.0, "em".into())).unwrap_err();
        assert_eq!(err, CcssError::eval(1, "px and em are incompatible units"));
        assert!(apply(BinOp::Mul, px(1.0), px(2.0)).is_err());
    }

    #[test]
    fn division_by_zero_fails() {
        for op in [BinOp::Div, BinOp::Mod] {
            let err = apply(op, px(1.0), Value::Number(0.0)).unwrap_err();
            assert_eq!(err.message(), "divide by zero");
        }
    }

    #[test]
    fn color_channels_clamp() {
        let white = Value::Color(Color::rgb(255, 255, 255));
        let grey = Value::Color(Color::rgb(16, 16, 16));
        assert_eq!(
            apply(BinOp::Add, white, grey.clone()).unwrap().to_css(false),
            "#ffffff"
        );
        assert_eq!(
            apply(BinOp::Sub, grey, Value::Number(20.0)).unwrap().to_css(false),
            "#000000"
        );
    }

    #[test]
    fn strings_repeat_and_fall_back_to_concatenation() {
        assert_eq!(
            apply(BinOp::Mul, Value::String("ab".into()), Value::Number(3.5)).unwrap(),
            Value::String("ababab".into())
        );
        assert_eq!(
            apply(BinOp::Add, Value::String("a".into()), px(1.0)).unwrap(),
            Value::String("a1px".into())
        );
        let err = apply(BinOp::Sub, Value::String("a".into()), px(1.0)).unwrap_err();
        assert!(err.message().contains("string and dimension"));
    }

    #[test]
    fn oversized_string_repetition_fails() {
        let err = apply(
            BinOp::Mul,
            Value::String("ab".into()),
            Value::Number(99999999999999999999.0),
        )
        .unwrap_err();
        assert!(matches!(err, CcssError::Eval { line: 1, .. }));
        assert!(err.message().contains("too large"));
        assert_eq!(
            apply(BinOp::Mul, Value::String("ab".into()), Value::Number(-2.0)).unwrap(),
            Value::String(String::new())
        );
    }

    #[test]
    fn lists_concatenate_and_append() {
        let list = Value::List(vec![px(1.0)]);
        let joined = apply(BinOp::Add, list, Value::List(vec![px(2.0)])).unwrap();
        let appended = apply(BinOp::Add, joined, px(3.0)).unwrap();
        assert_eq!(appended.to_css(false), "1px, 2px, 3px");
        assert_eq!(appended.to_css(true), "1px,2px,3px");
    }

    #[test]
    fn negation_only_for_numbers() {
        assert_eq!(px(3.0).negate(1).unwrap(), px(-3.0));
        assert!(Value::String("a".into()).negate(1).is_err());
    }

    #[test]
    fn strings_with_whitespace_are_quoted() {
        assert_eq!(Value::String("Times New Roman".into()).to_css(false), "'Times New Roman'");
        assert_eq!(Value::String("it's x".into()).to_css(false), r"'it\'s x'");
        assert_eq!(Value::String("serif".into()).to_css(false), "serif");
    }

    #[test]
    fn methods_dispatch_by_kind() {
        let call = |value: Value, method: &str, args: Vec<Value>| {
            value.call_method(method, args, 1, false)
        };
        assert_eq!(
            call(Value::String("a b".into()), "upper", vec![]).unwrap(),
            Value::String("A B".into())
        );
        assert_eq!(
            call(Value::Number(-2.456), "round", vec![Value::Number(1.0)]).unwrap(),
            Value::Number(-2.5)
        );
        assert_eq!(
            call(Value::String("a,b".into()), "split", vec![Value::String(",".into())]).unwrap(),
            Value::List(vec![Value::String("a".into()), Value::String("b".into())])
        );
        assert_eq!(
            call(px(1.0), "type", vec![]).unwrap(),
            Value::String("dimension".into())
        );
        assert_eq!(
            call(Value::String("a b".into()), "string", vec![]).unwrap(),
            Value::String("a b".into())
        );
        assert_eq!(
            call(px(2.0), "string", vec![]).unwrap(),
            Value::String("2px".into())
        );
        assert_eq!(
            call(Value::Number(1.25), "round", vec![Value::Number(1e300)]).unwrap(),
            Value::Number(1.25)
        );
        let err = call(px(1.0), "upper", vec![]).unwrap_err();
        assert_eq!(err.message(), "dimension objects don't have a method called upper");
    }

    #[test]
    fn color_methods() {
        let red = Value::Color(Color::from_name("red").unwrap());
        let darker = red.clone().call_method("darken", vec![Value::Number(10.0)], 1, false);
        assert_eq!(darker.unwrap().to_css(false), "#cc0000");
        let err = red
            .clone()
            .call_method("darken", vec![px(10.0)], 1, false)
            .unwrap_err();
        assert_eq!(err.message(), "invalid unit 'px'");
        let mixed = red.clone().call_method(
            "mix",
            vec![Value::Dimension(100.0, "%".into()), Value::Color(Color::rgb(0, 0, 255))],
            1,
            false,
        );
        assert_eq!(mixed.unwrap().to_css(false), "#0000ff");
        let err = red
            .call_method("mix", vec![Value::Color(Color::rgb(0, 0, 0))], 1, false)
            .unwrap_err();
        assert!(err.message().contains("exactly 2 arguments"));
    }

    #[test]
    fn rgba_and_sprite_rendering() {
        let rgba = Value::Rgba(Color::rgb(0, 255, 255), 0.3);
        assert_eq!(rgba.to_css(false), "rgba(0, 255, 255, 0.3)");
        assert_eq!(rgba.to_css(true), "rgba(0,255,255,.3)");
        let sprite = Value::Sprite(Sprite {
            name: "logo".into(),
            bbox: SpriteBox {
                x1: 0,
                y1: 16,
                x2: 32,
                y2: 32,
            },
            url: "big.png".into(),
        });
        assert_eq!(sprite.to_css(false), "url(big.png) -0px -16px");
        assert_eq!(
            sprite.call_method("height", vec![], 1, false).unwrap(),
            px(16.0)
        );
    }
}
