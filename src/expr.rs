use crate::ast::{BinOp, Expr, ExprKind};
use crate::error::{CcssError, CcssResult};
use crate::lexer::{Token, TokenStream};
use std::path::{Path, PathBuf};

/// 把一段属性值文本解析成表达式树。
///
/// `base_dir` 是表达式所在样式表的目录，`spritemap()` 的相对路径以它为基准。
pub fn parse_expression(source: &str, line: usize, base_dir: Option<&Path>) -> CcssResult<Expr> {
    let source = source.trim().trim_end_matches(';');
    let mut parser = ExprParser {
        stream: TokenStream::new(source, line)?,
        base_dir: base_dir.map(Path::to_path_buf),
    };
    let expr = parser.expr(false)?;
    if !parser.stream.is_eof() {
        return Err(CcssError::parse(
            line,
            format!("unexpected '{}'", parser.stream.current()),
        ));
    }
    Ok(expr)
}

/// 递归下降的表达式解析器，优先级从低到高依次为
/// 列表、并列、`+`、`-`、`*`、`/`、`%`、取负、基本项。
struct ExprParser<'a> {
    stream: TokenStream<'a>,
    base_dir: Option<PathBuf>,
}

impl<'a> ExprParser<'a> {
    fn line(&self) -> usize {
        self.stream.line()
    }

    fn node(&self, kind: ExprKind) -> Expr {
        Expr::new(kind, self.line())
    }

    fn expr(&mut self, ignore_comma: bool) -> CcssResult<Expr> {
        let mut items = vec![self.concat()?];
        while self.stream.is_op(';') || (!ignore_comma && self.stream.is_op(',')) {
            self.stream.advance()?;
            items.push(self.concat()?);
        }
        if items.len() == 1 {
            return Ok(items.remove(0));
        }
        Ok(self.node(ExprKind::List(items)))
    }

    fn concat(&mut self) -> CcssResult<Expr> {
        let mut items = vec![self.binary(BinOp::Add)?];
        while !self.stream.is_eof()
            && !self.stream.is_op(',')
            && !self.stream.is_op(';')
            && !self.stream.is_op(')')
        {
            items.push(self.binary(BinOp::Add)?);
        }
        if items.len() == 1 {
            return Ok(items.remove(0));
        }
        Ok(self.node(ExprKind::Concat(items)))
    }

    /// 每个运算符独占一个优先级：`+` < `-` < `*` < `/` < `%`。
    fn binary(&mut self, op: BinOp) -> CcssResult<Expr> {
        let tighter = match op {
            BinOp::Add => Some(BinOp::Sub),
            BinOp::Sub => Some(BinOp::Mul),
            BinOp::Mul => Some(BinOp::Div),
            BinOp::Div => Some(BinOp::Mod),
            BinOp::Mod => None,
        };
        let operand = |parser: &mut Self| match tighter {
            Some(next) => parser.binary(next),
            None => parser.neg(),
        };
        let mut left = operand(self)?;
        while self.stream.is_op(op.symbol()) {
            self.stream.advance()?;
            let right = operand(self)?;
            left = self.node(ExprKind::Binary(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn neg(&mut self) -> CcssResult<Expr> {
        if self.stream.is_op('-') {
            self.stream.advance()?;
            let inner = self.primary()?;
            return Ok(self.node(ExprKind::Neg(Box::new(inner))));
        }
        self.primary()
    }

    fn primary(&mut self) -> CcssResult<Expr> {
        let line = self.line();
        let mut node = match self.stream.advance()? {
            Token::Number(value) => Expr::new(ExprKind::Number(value), line),
            Token::Dimension(value, unit) => Expr::new(ExprKind::Dimension(value, unit), line),
            Token::Color(color) => Expr::new(ExprKind::Color(color), line),
            Token::String(text) => Expr::new(ExprKind::String(text), line),
            Token::Url(text) => Expr::new(ExprKind::Url(text), line),
            Token::Backstring(text) => Expr::new(ExprKind::Backstring(text), line),
            Token::Var(name) => Expr::new(ExprKind::Var(name), line),
            Token::Rgb => self.channels(3, "rgb")?,
            Token::Rgba => self.channels(4, "rgba")?,
            Token::SpriteMap => {
                let path = self.expr(false)?;
                self.stream.expect_op(')')?;
                Expr::new(
                    ExprKind::SpriteMap {
                        path: Box::new(path),
                        base_dir: self.base_dir.clone(),
                    },
                    line,
                )
            }
            Token::Op('(') => {
                if self.stream.is_op(')') {
                    return Err(CcssError::parse(
                        line,
                        "empty parentheses are not valid. If you want to use them as string you have to quote them.",
                    ));
                }
                let inner = self.expr(false)?;
                self.stream.expect_op(')')?;
                inner
            }
            Token::Call(_) => {
                return Err(CcssError::parse(
                    line,
                    "You cannot call standalone methods. If you wanted to use it as a string you have to quote it.",
                ));
            }
            Token::Eof => {
                return Err(CcssError::parse(line, "unexpected end of expression"));
            }
            Token::Op(op) => Expr::new(ExprKind::String(op.to_string()), line),
        };
        while let Token::Call(method) = self.stream.current().clone() {
            self.stream.advance()?;
            node = self.call(node, method)?;
        }
        Ok(node)
    }

    /// `rgb(` / `rgba(` 之后恰好 `count` 个逗号分隔的通道；没有括号时当作普通单词。
    fn channels(&mut self, count: usize, keyword: &str) -> CcssResult<Expr> {
        let line = self.line();
        if !self.stream.is_op('(') {
            return Ok(Expr::new(ExprKind::String(keyword.to_string()), line));
        }
        self.stream.advance()?;
        let mut args = Vec::with_capacity(count);
        while args.len() < count {
            if !args.is_empty() {
                self.stream.expect_op(',')?;
            }
            args.push(self.expr(true)?);
        }
        self.stream.expect_op(')')?;
        let kind = if count == 3 {
            ExprKind::Rgb(args)
        } else {
            ExprKind::Rgba(args)
        };
        Ok(Expr::new(kind, line))
    }

    fn call(&mut self, receiver: Expr, method: String) -> CcssResult<Expr> {
        let line = self.line();
        let mut args = Vec::new();
        while !self.stream.is_op(')') {
            if !args.is_empty() {
                self.stream.expect_op(',')?;
            }
            args.push(self.expr(true)?);
        }
        self.stream.expect_op(')')?;
        if method == "sprite" && args.len() == 1 {
            let name = args.remove(0);
            return Ok(Expr::new(
                ExprKind::Sprite {
                    map: Box::new(receiver),
                    name: Box::new(name),
                },
                line,
            ));
        }
        Ok(Expr::new(
            ExprKind::Call {
                receiver: Box::new(receiver),
                method,
                args,
            },
            line,
        ))
    }
}
