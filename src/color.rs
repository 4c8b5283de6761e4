use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// 颜色的来源：字面量（十六进制、rgb()、运算结果）或颜色名。
#[derive(Debug, Clone, PartialEq)]
pub enum ColorOrigin {
    Literal,
    Named(String),
}

/// 0–255 整数通道的 RGB 颜色。
#[derive(Debug, Clone, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub origin: ColorOrigin,
}

/// 亮度调整量：百分比按比例缩放，裸数值按绝对值加减。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Amount {
    Percent(f64),
    Absolute(f64),
}

impl Amount {
    fn value(self) -> f64 {
        match self {
            Amount::Percent(v) | Amount::Absolute(v) => v,
        }
    }
}

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r,
            g,
            b,
            origin: ColorOrigin::Literal,
        }
    }

    /// 由任意浮点通道构造颜色；四舍五入后截断到 [0, 255]。
    pub fn from_channels(channels: [f64; 3]) -> Self {
        Self::rgb(
            to_channel(channels[0]),
            to_channel(channels[1]),
            to_channel(channels[2]),
        )
    }

    /// 解析 `#rgb` 或 `#rrggbb`。
    pub fn from_hex(input: &str) -> Option<Self> {
        let hex = input.strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            3 => {
                let digit = |idx: usize| u8::from_str_radix(&hex[idx..idx + 1], 16).ok();
                Some(Self::rgb(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17))
            }
            6 => {
                let pair = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).ok();
                Some(Self::rgb(pair(0)?, pair(2)?, pair(4)?))
            }
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let [r, g, b] = *NAMED_COLORS.get(name)?;
        Some(Self {
            r,
            g,
            b,
            origin: ColorOrigin::Named(name.to_string()),
        })
    }

    pub fn channels(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// 丢弃颜色名来源，强制输出十六进制形式。
    pub fn to_literal(&self) -> Self {
        Self::rgb(self.r, self.g, self.b)
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// 普通模式输出完整的六位十六进制（颜色名来源的保持原名）；
    /// 压缩模式优先三位缩写，若已知颜色名更短则输出颜色名。
    pub fn to_css(&self, minify: bool) -> String {
        let code = self.to_hex();
        if !minify {
            return match &self.origin {
                ColorOrigin::Named(name) => name.clone(),
                ColorOrigin::Literal => code,
            };
        }
        let short = if self.channels().iter().all(|c| c >> 4 == c & 0x0f) {
            format!("#{:x}{:x}{:x}", self.r & 0x0f, self.g & 0x0f, self.b & 0x0f)
        } else {
            code.clone()
        };
        match REVERSE_COLORS.get(code.as_str()) {
            Some(name) if name.len() < short.len() => (*name).to_string(),
            _ => short,
        }
    }
}

pub fn brighten(color: &Color, amount: Amount) -> Color {
    if amount.value() == 0.0 {
        return color.clone();
    }
    let (h, s, mut l) = rgb_to_hsl(color);
    match amount {
        Amount::Percent(v) => l *= 1.0 + v / 100.0,
        Amount::Absolute(v) => l += v / 100.0,
    }
    hsl_to_rgb(h, s, l.clamp(0.0, 1.0))
}

/// 百分比参数把亮度缩放到原值的该比例（`10%` 只保留一成亮度），裸数值按点数减少。
pub fn darken(color: &Color, amount: Amount) -> Color {
    if amount.value() == 0.0 {
        return color.clone();
    }
    let (h, s, mut l) = rgb_to_hsl(color);
    match amount {
        Amount::Percent(v) => l *= v / 100.0,
        Amount::Absolute(v) => l -= v / 100.0,
    }
    hsl_to_rgb(h, s, l.clamp(0.0, 1.0))
}

/// 以给定“油墨量”向白色网点化：0% 为白色，100% 为原色。
pub fn tint(color: &Color, lighten: f64) -> Color {
    let ink = lighten.abs() / 100.0;
    let (h, s, l) = rgb_to_hsl(color);
    let available = 1.0 - l;
    let new_l = available * (1.0 - ink) + l;
    let base_l = if l == 0.0 { 1.0 } else { l };
    let new_s = if new_l == 0.0 { s } else { s * base_l / new_l };
    hsl_to_rgb(h, new_s, new_l)
}

/// HSV 空间的明度/饱和度调整，两个参数都在 [-100, 100]。
pub fn shade(color: &Color, lightness: f64, saturation: f64) -> Color {
    let lightness = lightness.clamp(-100.0, 100.0) / 100.0;
    let saturation = saturation.clamp(-100.0, 100.0) / 100.0;
    let (h, s, v) = rgb_to_hsv(color);
    let new_v = if lightness >= 0.0 {
        v + (1.0 - v) * lightness
    } else {
        v + v * lightness
    };
    let new_s = if saturation >= 0.0 {
        s + (1.0 - s) * saturation
    } else {
        s + s * saturation
    };
    hsv_to_rgb(h, new_s, new_v)
}

/// RGB 线性插值；`percent` 为 0 返回自身，为 100 返回 `other`。
pub fn mix(color: &Color, other: &Color, percent: f64) -> Color {
    let amount = percent.abs();
    if amount == 0.0 {
        return color.clone();
    }
    if amount == 100.0 {
        return other.clone();
    }
    let t = amount / 100.0;
    let blend = |a: u8, b: u8| a as f64 * (1.0 - t) + b as f64 * t;
    Color::from_channels([
        blend(color.r, other.r),
        blend(color.g, other.g),
        blend(color.b, other.b),
    ])
}

/// RGB → HSL，三个分量均在 [0, 1]。
pub fn rgb_to_hsl(color: &Color) -> (f64, f64, f64) {
    let r = color.r as f64 / 255.0;
    let g = color.g as f64 / 255.0;
    let b = color.b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l <= 0.5 {
        d / (max + min)
    } else {
        d / (2.0 - max - min)
    };

    (hue(r, g, b, max, d), s, l)
}

pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Color {
    if s == 0.0 {
        return Color::from_channels([l * 255.0; 3]);
    }

    let q = if l <= 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;

    Color::from_channels([
        hue_to_rgb(p, q, h + 1.0 / 3.0) * 255.0,
        hue_to_rgb(p, q, h) * 255.0,
        hue_to_rgb(p, q, h - 1.0 / 3.0) * 255.0,
    ])
}

/// RGB → HSV，三个分量均在 [0, 1]。
pub fn rgb_to_hsv(color: &Color) -> (f64, f64, f64) {
    let r = color.r as f64 / 255.0;
    let g = color.g as f64 / 255.0;
    let b = color.b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == min {
        return (0.0, 0.0, max);
    }
    let d = max - min;
    (hue(r, g, b, max, d), d / max, max)
}

pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Color {
    if s == 0.0 {
        return Color::from_channels([v * 255.0; 3]);
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    Color::from_channels([r * 255.0, g * 255.0, b * 255.0])
}

fn hue(r: f64, g: f64, b: f64, max: f64, d: f64) -> f64 {
    let h = if max == r {
        (g - b) / d
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0).rem_euclid(1.0)
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);
    match t {
        _ if t < 1.0 / 6.0 => p + (q - p) * 6.0 * t,
        _ if t < 1.0 / 2.0 => q,
        _ if t < 2.0 / 3.0 => p + (q - p) * (2.0 / 3.0 - t) * 6.0,
        _ => p,
    }
}

fn to_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// CSS 颜色名表，按字母序；反查表中同值颜色取先出现的名字。
static COLOR_TABLE: &[(&str, [u8; 3])] = &[
    ("aliceblue", [240, 248, 255]),
    ("antiquewhite", [250, 235, 215]),
    ("aqua", [0, 255, 255]),
    ("aquamarine", [127, 255, 212]),
    ("azure", [240, 255, 255]),
    ("beige", [245, 245, 220]),
    ("bisque", [255, 228, 196]),
    ("black", [0, 0, 0]),
    ("blanchedalmond", [255, 235, 205]),
    ("blue", [0, 0, 255]),
    ("blueviolet", [138, 43, 226]),
    ("brown", [165, 42, 42]),
    ("burlywood", [222, 184, 135]),
    ("cadetblue", [95, 158, 160]),
    ("chartreuse", [127, 255, 0]),
    ("chocolate", [210, 105, 30]),
    ("coral", [255, 127, 80]),
    ("cornflowerblue", [100, 149, 237]),
    ("cornsilk", [255, 248, 220]),
    ("crimson", [220, 20, 60]),
    ("cyan", [0, 255, 255]),
    ("darkblue", [0, 0, 139]),
    ("darkcyan", [0, 139, 139]),
    ("darkgoldenrod", [184, 134, 11]),
    ("darkgray", [169, 169, 169]),
    ("darkgreen", [0, 100, 0]),
    ("darkgrey", [169, 169, 169]),
    ("darkkhaki", [189, 183, 107]),
    ("darkmagenta", [139, 0, 139]),
    ("darkolivegreen", [85, 107, 47]),
    ("darkorange", [255, 140, 0]),
    ("darkorchid", [153, 50, 204]),
    ("darkred", [139, 0, 0]),
    ("darksalmon", [233, 150, 122]),
    ("darkseagreen", [143, 188, 143]),
    ("darkslateblue", [72, 61, 139]),
    ("darkslategray", [47, 79, 79]),
    ("darkslategrey", [47, 79, 79]),
    ("darkturquoise", [0, 206, 209]),
    ("darkviolet", [148, 0, 211]),
    ("deeppink", [255, 20, 147]),
    ("deepskyblue", [0, 191, 255]),
    ("dimgray", [105, 105, 105]),
    ("dimgrey", [105, 105, 105]),
    ("dodgerblue", [30, 144, 255]),
    ("firebrick", [178, 34, 34]),
    ("floralwhite", [255, 250, 240]),
    ("forestgreen", [34, 139, 34]),
    ("fuchsia", [255, 0, 255]),
    ("gainsboro", [220, 220, 220]),
    ("ghostwhite", [248, 248, 255]),
    ("gold", [255, 215, 0]),
    ("goldenrod", [218, 165, 32]),
    ("gray", [128, 128, 128]),
    ("green", [0, 128, 0]),
    ("greenyellow", [173, 255, 47]),
    ("grey", [128, 128, 128]),
    ("honeydew", [240, 255, 240]),
    ("hotpink", [255, 105, 180]),
    ("indianred", [205, 92, 92]),
    ("indigo", [75, 0, 130]),
    ("ivory", [255, 255, 240]),
    ("khaki", [240, 230, 140]),
    ("lavender", [230, 230, 250]),
    ("lavenderblush", [255, 240, 245]),
    ("lawngreen", [124, 252, 0]),
    ("lemonchiffon", [255, 250, 205]),
    ("lightblue", [173, 216, 230]),
    ("lightcoral", [240, 128, 128]),
    ("lightcyan", [224, 255, 255]),
    ("lightgoldenrodyellow", [250, 250, 210]),
    ("lightgray", [211, 211, 211]),
    ("lightgreen", [144, 238, 144]),
    ("lightgrey", [211, 211, 211]),
    ("lightpink", [255, 182, 193]),
    ("lightsalmon", [255, 160, 122]),
    ("lightseagreen", [32, 178, 170]),
    ("lightskyblue", [135, 206, 250]),
    ("lightslategray", [119, 136, 153]),
    ("lightslategrey", [119, 136, 153]),
    ("lightsteelblue", [176, 196, 222]),
    ("lightyellow", [255, 255, 224]),
    ("lime", [0, 255, 0]),
    ("limegreen", [50, 205, 50]),
    ("linen", [250, 240, 230]),
    ("magenta", [255, 0, 255]),
    ("maroon", [128, 0, 0]),
    ("mediumaquamarine", [102, 205, 170]),
    ("mediumblue", [0, 0, 205]),
    ("mediumorchid", [186, 85, 211]),
    ("mediumpurple", [147, 112, 219]),
    ("mediumseagreen", [60, 179, 113]),
    ("mediumslateblue", [123, 104, 238]),
    ("mediumspringgreen", [0, 250, 154]),
    ("mediumturquoise", [72, 209, 204]),
    ("mediumvioletred", [199, 21, 133]),
    ("midnightblue", [25, 25, 112]),
    ("mintcream", [245, 255, 250]),
    ("mistyrose", [255, 228, 225]),
    ("moccasin", [255, 228, 181]),
    ("navajowhite", [255, 222, 173]),
    ("navy", [0, 0, 128]),
    ("oldlace", [253, 245, 230]),
    ("olive", [128, 128, 0]),
    ("olivedrab", [107, 142, 35]),
    ("orange", [255, 165, 0]),
    ("orangered", [255, 69, 0]),
    ("orchid", [218, 112, 214]),
    ("palegoldenrod", [238, 232, 170]),
    ("palegreen", [152, 251, 152]),
    ("paleturquoise", [175, 238, 238]),
    ("palevioletred", [219, 112, 147]),
    ("papayawhip", [255, 239, 213]),
    ("peachpuff", [255, 218, 185]),
    ("peru", [205, 133, 63]),
    ("pink", [255, 192, 203]),
    ("plum", [221, 160, 221]),
    ("powderblue", [176, 224, 230]),
    ("purple", [128, 0, 128]),
    ("red", [255, 0, 0]),
    ("rosybrown", [188, 143, 143]),
    ("royalblue", [65, 105, 225]),
    ("saddlebrown", [139, 69, 19]),
    ("salmon", [250, 128, 114]),
    ("sandybrown", [244, 164, 96]),
    ("seagreen", [46, 139, 87]),
    ("seashell", [255, 245, 238]),
    ("sienna", [160, 82, 45]),
    ("silver", [192, 192, 192]),
    ("skyblue", [135, 206, 235]),
    ("slateblue", [106, 90, 205]),
    ("slategray", [112, 128, 144]),
    ("slategrey", [112, 128, 144]),
    ("snow", [255, 250, 250]),
    ("springgreen", [0, 255, 127]),
    ("steelblue", [70, 130, 180]),
    ("tan", [210, 180, 140]),
    ("teal", [0, 128, 128]),
    ("thistle", [216, 191, 216]),
    ("tomato", [255, 99, 71]),
    ("turquoise", [64, 224, 208]),
    ("violet", [238, 130, 238]),
    ("wheat", [245, 222, 179]),
    ("white", [255, 255, 255]),
    ("whitesmoke", [245, 245, 245]),
    ("yellow", [255, 255, 0]),
    ("yellowgreen", [154, 205, 50]),
];

static NAMED_COLORS: Lazy<IndexMap<&'static str, [u8; 3]>> =
    Lazy::new(|| COLOR_TABLE.iter().copied().collect());

static REVERSE_COLORS: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut reverse = HashMap::new();
    for (name, [r, g, b]) in COLOR_TABLE {
        reverse
            .entry(format!("#{r:02x}{g:02x}{b:02x}"))
            .or_insert(*name);
    }
    reverse
});
