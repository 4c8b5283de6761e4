use crate::color::Color;
use indexmap::IndexMap;
use std::fmt::{self, Display};
use std::path::PathBuf;

/// 表达式节点：不可变的树，每个节点都记录所在源码行。
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, line: usize) -> Self {
        Self { kind, line }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    Dimension(f64, String),
    Color(Color),
    String(String),
    Url(String),
    /// 反引号字符串，原样输出。
    Backstring(String),
    /// 逗号或分号分隔的列表。
    List(Vec<Expr>),
    /// 没有运算符、仅以空白并列的表达式。
    Concat(Vec<Expr>),
    Var(String),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Call {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Rgb(Vec<Expr>),
    Rgba(Vec<Expr>),
    /// `spritemap(path)`；路径相对于表达式所在样式表的目录。
    SpriteMap {
        path: Box<Expr>,
        base_dir: Option<PathBuf>,
    },
    Sprite {
        map: Box<Expr>,
        name: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn symbol(self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
            BinOp::Mod => '%',
        }
    }
}

impl Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// 规则体里的一行：属性声明或宏调用，值仍是未解析的文本。
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Property {
        line: usize,
        name: String,
        value: String,
    },
    MacroCall {
        line: usize,
        name: String,
    },
}

/// 与源码缩进对应的规则树节点。
#[derive(Debug, Clone, PartialEq)]
pub struct RawRule {
    pub line: usize,
    pub selector: String,
    pub declarations: Vec<Declaration>,
    pub children: Vec<RawRule>,
}

impl RawRule {
    pub fn new(selector: impl Into<String>, line: usize) -> Self {
        Self {
            line,
            selector: selector.into(),
            declarations: Vec::new(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    pub line: usize,
    pub name: String,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub line: usize,
    pub target: String,
}

/// 结构解析的结果，声明值尚未解析成表达式。
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub rules: Vec<RawRule>,
    pub variables: IndexMap<String, (usize, String)>,
    pub macros: IndexMap<String, MacroDef>,
    pub imports: Vec<ImportDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub line: usize,
    pub name: String,
    pub value: Expr,
}

/// 扁平化后的规则：选择器均为完整的后代链，`selectors` 非空。
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRule {
    pub media: Option<String>,
    pub selectors: Vec<String>,
    pub properties: Vec<Property>,
}

/// 单个源文件解析并扁平化后的样式表。
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    pub rules: Vec<FlatRule>,
    pub variables: IndexMap<String, Expr>,
    pub imports: Vec<ImportDecl>,
}
