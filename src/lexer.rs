use crate::color::Color;
use crate::error::{CcssError, CcssResult};
use crate::units::UNIT_PATTERN;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{self, Display};

/// 表达式词法单元。
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Dimension(f64, String),
    Color(Color),
    String(String),
    Url(String),
    /// `spritemap(`，参数由解析器继续读取。
    SpriteMap,
    Backstring(String),
    Var(String),
    Op(char),
    /// `.name(` 形式的方法调用。
    Call(String),
    Rgb,
    Rgba,
    Eof,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(value) => write!(f, "{value}"),
            Token::Dimension(value, unit) => write!(f, "{value}{unit}"),
            Token::Color(color) => f.write_str(&color.to_css(false)),
            Token::String(text) => f.write_str(text),
            Token::Url(text) => write!(f, "url({text})"),
            Token::SpriteMap => f.write_str("spritemap("),
            Token::Backstring(text) => write!(f, "`{text}`"),
            Token::Var(name) => write!(f, "${name}"),
            Token::Op(op) => write!(f, "{op}"),
            Token::Call(name) => write!(f, ".{name}("),
            Token::Rgb => f.write_str("rgb"),
            Token::Rgba => f.write_str("rgba"),
            Token::Eof => f.write_str("end of expression"),
        }
    }
}

const OPERATORS: &str = "+-*/%(),;";
const STRING_STOP: &str = "*/();,+$";

static VENDOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-(?:webkit|moz|ms|o|khtml)-[^\s*/();,+$]+").expect("厂商前缀正则编译失败")
});
static CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.([a-zA-Z_][a-zA-Z0-9_]*)\(").expect("方法调用正则编译失败"));
static DIMENSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(\d*\.?\d+)({UNIT_PATTERN})")).expect("数值单位正则编译失败")
});
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d*\.?\d+").expect("数字正则编译失败"));
static COLOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9a-zA-Z]+").expect("颜色正则编译失败"));
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^url\(\s*('(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|.*?)\s*\)"#).expect("url 正则编译失败")
});
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*")"#).expect("字符串正则编译失败")
});
static BACKSTRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^`([^`]*)`").expect("反引号字符串正则编译失败"));
static VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$(?:([a-zA-Z_][a-zA-Z0-9_]*)|\{([a-zA-Z_][a-zA-Z0-9_]*)\})").expect("变量正则编译失败")
});

/// 惰性的表达式词法分析器，按固定顺序尝试各个候选规则。
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, line: usize) -> Self {
        Self {
            source,
            pos: 0,
            line,
            done: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn next_token(&mut self) -> CcssResult<Token> {
        let trimmed = self.rest().trim_start();
        self.pos = self.source.len() - trimmed.len();
        let rest = self.rest();
        let Some(first) = rest.chars().next() else {
            return Ok(Token::Eof);
        };

        if let Some(m) = VENDOR_RE.find(rest) {
            self.pos += m.end();
            return Ok(Token::String(m.as_str().to_string()));
        }
        if first == '-' && self.signed_number_allowed() {
            if let Some(token) = self.scan_numeric(1)? {
                return Ok(match token {
                    Token::Number(value) => Token::Number(-value),
                    Token::Dimension(value, unit) => Token::Dimension(-value, unit),
                    other => other,
                });
            }
        }
        if OPERATORS.contains(first) {
            self.pos += first.len_utf8();
            return Ok(Token::Op(first));
        }
        if let Some(caps) = CALL_RE.captures(rest) {
            self.pos += caps[0].len();
            return Ok(Token::Call(caps[1].to_string()));
        }
        if let Some(token) = self.scan_numeric(0)? {
            return Ok(token);
        }
        if let Some(caps) = URL_RE.captures(rest) {
            self.pos += caps[0].len();
            return Ok(Token::Url(caps[1].to_string()));
        }
        if rest.starts_with("spritemap(") {
            self.pos += "spritemap(".len();
            return Ok(Token::SpriteMap);
        }
        if let Some(caps) = BACKSTRING_RE.captures(rest) {
            self.pos += caps[0].len();
            return Ok(Token::Backstring(caps[1].to_string()));
        }
        if let Some(m) = QUOTED_RE.find(rest) {
            self.pos += m.end();
            let text = m.as_str();
            return Ok(Token::String(unescape(&text[1..text.len() - 1])));
        }
        if first == '$' {
            if let Some(caps) = VAR_RE.captures(rest) {
                self.pos += caps[0].len();
                let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                return Ok(Token::Var(name.to_string()));
            }
            return Err(CcssError::parse(
                self.line,
                format!("syntax error near '{}'", preview(rest)),
            ));
        }
        Ok(self.scan_bare_string())
    }

    /// `-` 紧跟数字，且位于表达式开头或空白、`(`、`,` 之后时视为负号的一部分。
    fn signed_number_allowed(&self) -> bool {
        let before = self.source[..self.pos].chars().next_back();
        matches!(before, None | Some('(') | Some(',')) || before.is_some_and(char::is_whitespace)
    }

    /// 从 `pos + skip` 开始尝试读取带单位的数值、十六进制颜色或裸数字。
    fn scan_numeric(&mut self, skip: usize) -> CcssResult<Option<Token>> {
        let rest = &self.rest()[skip..];
        if let Some(caps) = DIMENSION_RE.captures(rest) {
            let end = caps[0].len();
            if !continues_word(&rest[end..]) {
                let value = parse_float(&caps[1], self.line)?;
                self.pos += skip + end;
                return Ok(Some(Token::Dimension(value, caps[2].to_string())));
            }
        }
        if skip == 0 {
            if let Some(m) = COLOR_RE.find(rest) {
                self.pos += m.end();
                return Color::from_hex(m.as_str())
                    .map(|color| Some(Token::Color(color)))
                    .ok_or_else(|| CcssError::parse(self.line, "invalid color value"));
            }
        }
        if let Some(m) = NUMBER_RE.find(rest) {
            if !continues_word(&rest[m.end()..]) {
                let value = parse_float(m.as_str(), self.line)?;
                self.pos += skip + m.end();
                return Ok(Some(Token::Number(value)));
            }
        }
        Ok(None)
    }

    /// 裸字符串：直到空白或分隔符为止；`.` 只在不构成方法调用时属于字符串。
    fn scan_bare_string(&mut self) -> Token {
        let rest = self.rest();
        let mut text = String::new();
        let mut chars = rest.char_indices().peekable();
        let mut end = rest.len();
        while let Some((idx, ch)) = chars.next() {
            if ch.is_whitespace() || STRING_STOP.contains(ch) {
                end = idx;
                break;
            }
            if ch == '.' && CALL_RE.is_match(&rest[idx..]) {
                end = idx;
                break;
            }
            if ch == '\\' && matches!(chars.peek(), Some((_, '$'))) {
                chars.next();
                text.push('$');
                continue;
            }
            if ch == '$' {
                end = idx;
                break;
            }
            text.push(ch);
        }
        if end == 0 {
            // 至少前进一个字符，避免死循环
            self.pos += rest.chars().next().map_or(0, char::len_utf8);
            return Token::String(rest.chars().take(1).collect());
        }
        self.pos += end;
        match text.as_str() {
            "rgb" => Token::Rgb,
            "rgba" => Token::Rgba,
            name => match Color::from_name(name) {
                Some(color) => Token::Color(color),
                None => Token::String(text),
            },
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = CcssResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let token = self.next_token();
        if matches!(token, Ok(Token::Eof) | Err(_)) {
            self.done = true;
        }
        Some(token)
    }
}

/// 带一个前瞻单元的词法流。
pub struct TokenStream<'a> {
    lexer: Lexer<'a>,
    current: Token,
    line: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(source: &'a str, line: usize) -> CcssResult<Self> {
        let mut lexer = Lexer::new(source, line);
        let current = lexer.next().unwrap_or(Ok(Token::Eof))?;
        Ok(Self {
            lexer,
            current,
            line,
        })
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    /// 前进一个单元并返回被越过的单元。
    pub fn advance(&mut self) -> CcssResult<Token> {
        let next = self.lexer.next().unwrap_or(Ok(Token::Eof))?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    pub fn is_op(&self, op: char) -> bool {
        self.current == Token::Op(op)
    }

    pub fn is_eof(&self) -> bool {
        self.current == Token::Eof
    }

    pub fn expect_op(&mut self, op: char) -> CcssResult<()> {
        if self.is_op(op) {
            self.advance()?;
            return Ok(());
        }
        Err(CcssError::parse(
            self.line,
            format!("expected '{op}', got '{}'", self.current),
        ))
    }
}

fn continues_word(rest: &str) -> bool {
    rest.chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn parse_float(text: &str, line: usize) -> CcssResult<f64> {
    text.parse::<f64>()
        .map_err(|_| CcssError::parse(line, format!("invalid number '{text}'")))
}

fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

fn preview(rest: &str) -> String {
    rest.chars().take(10).collect()
}
