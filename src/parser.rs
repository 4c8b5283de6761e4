use crate::ast::{Declaration, Document, ImportDecl, MacroDef, RawRule, Stylesheet};
use crate::error::{CcssError, CcssResult};
use crate::expr::parse_expression;
use crate::flatten::Flattener;
use crate::scanner::{LineScanner, END_MARKER};
use crate::utils::expand_tabs;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static VAR_DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z_][a-zA-Z0-9_]*)\s*=\s*(.+)").expect("变量定义正则编译失败")
});
static DEF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z-]+)\s*:\s*(.+)").expect("属性声明正则编译失败"));
static MACRO_DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^def\s+([a-zA-Z_][a-zA-Z0-9_-]*)\s*:$").expect("宏定义正则编译失败")
});
static MACRO_CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$([a-zA-Z_][a-zA-Z0-9_-]*)$").expect("宏调用正则编译失败"));
static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^@import\s+(?:url\(\s*)?['"]?([^'")]+?)['"]?\s*\)?\s*;?$"#)
        .expect("导入正则编译失败")
});

/// 解析单个源文件：结构解析 → 规则扁平化 → 变量表达式解析。
pub fn parse(source: &str, base_dir: Option<&Path>) -> CcssResult<Stylesheet> {
    let document = CcssParser::new().parse(source)?;
    let rules = Flattener::new(&document.macros, base_dir).flatten(&document.rules)?;
    let mut variables = IndexMap::with_capacity(document.variables.len());
    for (name, (line, text)) in document.variables {
        let expr = parse_expression(&text, line, base_dir)?;
        variables.insert(name, expr);
    }
    Ok(Stylesheet {
        rules,
        variables,
        imports: document.imports,
    })
}

/// 解析栈中的一层，与缩进栈一一对应。
#[derive(Debug)]
enum Frame {
    Root,
    Rule(RawRule),
    GroupBlock {
        prefix: String,
        declarations: Vec<Declaration>,
    },
    Macro(MacroDef),
}

impl Frame {
    fn name(&self) -> &'static str {
        match self {
            Frame::Root => "root",
            Frame::Rule(_) => "rule",
            Frame::GroupBlock { .. } => "group_block",
            Frame::Macro(_) => "macros",
        }
    }
}

/// 按行驱动的结构解析器，把缩进还原成规则树。
pub struct CcssParser {
    frames: Vec<Frame>,
    indents: Vec<usize>,
    /// 刚打开、尚未出现缩进正文的块。
    pending: Option<Frame>,
    /// 以逗号结尾、尚未闭合的多行选择器。
    selector_lines: Vec<String>,
    document: Document,
}

impl Default for CcssParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CcssParser {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::Root],
            indents: vec![0],
            pending: None,
            selector_lines: Vec::new(),
            document: Document::default(),
        }
    }

    pub fn parse(mut self, source: &str) -> CcssResult<Document> {
        for item in LineScanner::new(source).with_end_marker() {
            let (lineno, raw) = item?;
            let line = expand_tabs(&raw);
            let text = line.trim();
            let indent = line.len() - line.trim_start().len();

            self.apply_indent(indent, lineno)?;
            if text == END_MARKER {
                if !self.selector_lines.is_empty() {
                    return Err(CcssError::parse(lineno, "unterminated selector list"));
                }
                break;
            }
            self.handle_line(text, lineno)?;
        }
        self.pending = None;
        while self.frames.len() > 1 {
            self.pop_frame();
        }
        Ok(self.document)
    }

    fn apply_indent(&mut self, indent: usize, lineno: usize) -> CcssResult<()> {
        let top = self.indents.last().copied().unwrap_or(0);
        if indent > top {
            let frame = self
                .pending
                .take()
                .ok_or_else(|| CcssError::parse(lineno, "unexpected indent"))?;
            log::trace!("line {lineno}: enter {} at indent {indent}", frame.name());
            self.frames.push(frame);
            self.indents.push(indent);
            return Ok(());
        }
        if self.pending.is_some() {
            return Err(CcssError::parse(
                lineno,
                "expected definitions, found nothing",
            ));
        }
        if indent < top {
            if !self.indents.contains(&indent) {
                return Err(CcssError::parse(lineno, "invalid dedent"));
            }
            while self.indents.last().is_some_and(|level| *level != indent) {
                self.pop_frame();
            }
        }
        Ok(())
    }

    /// 弹出一层并把它的内容挂到上一层。
    fn pop_frame(&mut self) {
        self.indents.pop();
        let Some(frame) = self.frames.pop() else {
            return;
        };
        log::trace!("leave {}", frame.name());
        match frame {
            Frame::Root => {}
            Frame::Rule(rule) => match self.frames.last_mut() {
                Some(Frame::Rule(parent)) => parent.children.push(rule),
                _ => self.document.rules.push(rule),
            },
            Frame::GroupBlock {
                prefix,
                declarations,
            } => {
                let prefixed = declarations.into_iter().map(|decl| match decl {
                    Declaration::Property { line, name, value } => Declaration::Property {
                        line,
                        name: format!("{prefix}-{name}"),
                        value,
                    },
                    call => call,
                });
                match self.frames.last_mut() {
                    Some(Frame::Rule(rule)) => rule.declarations.extend(prefixed),
                    Some(Frame::Macro(def)) => def.declarations.extend(prefixed),
                    _ => {}
                }
            }
            Frame::Macro(def) => {
                self.document.macros.insert(def.name.clone(), def);
            }
        }
    }

    fn handle_line(&mut self, text: &str, lineno: usize) -> CcssResult<()> {
        match self.frames.last() {
            Some(Frame::Root) => self.handle_root(text, lineno),
            Some(Frame::Rule(_)) => self.handle_rule(text, lineno),
            Some(Frame::GroupBlock { .. }) => {
                let decl = parse_definition(text, lineno)?;
                if let Some(Frame::GroupBlock { declarations, .. }) = self.frames.last_mut() {
                    declarations.push(decl);
                }
                Ok(())
            }
            Some(Frame::Macro(_)) => self.handle_macro(text, lineno),
            None => Err(CcssError::parse(lineno, "parser stack is empty")),
        }
    }

    fn handle_root(&mut self, text: &str, lineno: usize) -> CcssResult<()> {
        if let Some(caps) = MACRO_DEF_RE.captures(text) {
            let name = caps[1].to_string();
            if self.document.variables.contains_key(&name)
                || self.document.macros.contains_key(&name)
            {
                return Err(CcssError::parse(
                    lineno,
                    format!("name \"{name}\" is already defined"),
                ));
            }
            self.pending = Some(Frame::Macro(MacroDef {
                line: lineno,
                name,
                declarations: Vec::new(),
            }));
            return Ok(());
        }
        if text.starts_with("@import") {
            let caps = IMPORT_RE
                .captures(text)
                .ok_or_else(|| CcssError::parse(lineno, "invalid import statement"))?;
            self.document.imports.push(ImportDecl {
                line: lineno,
                target: caps[1].trim().to_string(),
            });
            return Ok(());
        }
        if self.try_selector(text, lineno)? {
            return Ok(());
        }
        if text.contains('=') {
            let caps = VAR_DEF_RE
                .captures(text)
                .ok_or_else(|| CcssError::parse(lineno, "invalid syntax"))?;
            let name = caps[1].to_string();
            if self.document.variables.contains_key(&name) {
                return Err(CcssError::parse(
                    lineno,
                    format!("variable \"{name}\" defined twice"),
                ));
            }
            self.document
                .variables
                .insert(name, (lineno, caps[2].to_string()));
            return Ok(());
        }
        Err(CcssError::parse(
            lineno,
            "Style definitions or group blocks are only allowed inside a rule or group block.",
        ))
    }

    fn handle_rule(&mut self, text: &str, lineno: usize) -> CcssResult<()> {
        if self.try_selector(text, lineno)? || self.try_group_block(text, lineno)? {
            return Ok(());
        }
        let decl = parse_body_line(text, lineno)?;
        if let Some(Frame::Rule(rule)) = self.frames.last_mut() {
            rule.declarations.push(decl);
        }
        Ok(())
    }

    fn handle_macro(&mut self, text: &str, lineno: usize) -> CcssResult<()> {
        if self.try_group_block(text, lineno)? {
            return Ok(());
        }
        let decl = parse_body_line(text, lineno)?;
        if let Some(Frame::Macro(def)) = self.frames.last_mut() {
            def.declarations.push(decl);
        }
        Ok(())
    }

    /// 处理选择器行：逗号结尾的行先缓存，冒号结尾的行打开一条规则。
    fn try_selector(&mut self, text: &str, lineno: usize) -> CcssResult<bool> {
        if text.ends_with(',') {
            self.selector_lines.push(text.to_string());
            return Ok(true);
        }
        let Some(header) = text.strip_suffix(':') else {
            if !self.selector_lines.is_empty() {
                return Err(CcssError::parse(lineno, "unterminated selector list"));
            }
            return Ok(false);
        };
        let mut selector = self.selector_lines.join(" ");
        self.selector_lines.clear();
        if !selector.is_empty() {
            selector.push(' ');
        }
        selector.push_str(header.trim_end());
        let selector = selector.trim().to_string();
        if selector.is_empty() {
            return Err(CcssError::parse(lineno, "empty rule"));
        }
        self.pending = Some(Frame::Rule(RawRule::new(selector, lineno)));
        Ok(true)
    }

    fn try_group_block(&mut self, text: &str, lineno: usize) -> CcssResult<bool> {
        let Some(prefix) = text.strip_suffix("->") else {
            return Ok(false);
        };
        let prefix = prefix.trim_end();
        if prefix.is_empty() {
            return Err(CcssError::parse(lineno, "no group prefix defined"));
        }
        self.pending = Some(Frame::GroupBlock {
            prefix: prefix.to_string(),
            declarations: Vec::new(),
        });
        Ok(true)
    }
}

fn parse_body_line(text: &str, lineno: usize) -> CcssResult<Declaration> {
    if let Some(caps) = MACRO_CALL_RE.captures(text) {
        return Ok(Declaration::MacroCall {
            line: lineno,
            name: caps[1].to_string(),
        });
    }
    parse_definition(text, lineno)
}

fn parse_definition(text: &str, lineno: usize) -> CcssResult<Declaration> {
    let caps = DEF_RE
        .captures(text)
        .ok_or_else(|| CcssError::parse(lineno, "invalid syntax for style definition"))?;
    Ok(Declaration::Property {
        line: lineno,
        name: caps[1].to_string(),
        value: caps[2].trim().to_string(),
    })
}
