use crate::ast::{Expr, ExprKind, FlatRule, Stylesheet};
use crate::color::Color;
use crate::error::{CcssError, CcssResult};
use crate::expr::parse_expression;
use crate::importer::ImportResolver;
use crate::parser;
use crate::sprite::{SpriteMap, SpriteSource};
use crate::value::{Sprite, Value};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// 求值后的声明。
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedDeclaration {
    pub name: String,
    pub value: String,
}

/// 经过语义求值后的规则信息。
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedRule {
    pub media: Option<String>,
    pub selectors: Vec<String>,
    pub declarations: Vec<EvaluatedDeclaration>,
}

/// 需要展开成厂商前缀版本的属性。
static VENDOR_PREFIXES: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    const MOZ_WEBKIT: &[&str] = &["moz", "webkit"];
    HashMap::from([
        ("border-radius", MOZ_WEBKIT),
        ("border-top-left-radius", MOZ_WEBKIT),
        ("border-top-right-radius", MOZ_WEBKIT),
        ("border-bottom-left-radius", MOZ_WEBKIT),
        ("border-bottom-right-radius", MOZ_WEBKIT),
        ("box-shadow", MOZ_WEBKIT),
        ("box-sizing", MOZ_WEBKIT),
        ("background-clip", MOZ_WEBKIT),
        ("background-origin", MOZ_WEBKIT),
        ("user-select", &["moz", "webkit", "ms"] as &[&str]),
    ])
});

/// 变量表与正在解析的变量链。
#[derive(Debug, Default)]
pub struct Context {
    variables: IndexMap<String, Rc<Expr>>,
    resolving: Vec<String>,
    minify: bool,
}

impl Context {
    pub fn new(minify: bool) -> Self {
        Self {
            minify,
            ..Self::default()
        }
    }

    /// 调用方传入的变量，覆盖同名绑定。
    pub fn bind(&mut self, name: impl Into<String>, expr: Expr) {
        self.variables.insert(name.into(), Rc::new(expr));
    }

    /// 样式表中的默认变量，只在尚未绑定时生效。
    pub fn define_default(&mut self, name: &str, expr: &Expr) {
        if !self.variables.contains_key(name) {
            self.variables
                .insert(name.to_string(), Rc::new(expr.clone()));
        }
    }

    pub fn minify(&self) -> bool {
        self.minify
    }
}

/// 已解析的样式表及其导入的子表。
struct LoadedSheet {
    path: Option<PathBuf>,
    stylesheet: Stylesheet,
    imports: Vec<LoadedSheet>,
}

/// 负责变量解析、导入展开与表达式求值，输出带最终文本的规则。
pub struct Evaluator<'s> {
    context: Context,
    sprites: &'s mut dyn SpriteSource,
    importer: ImportResolver,
}

impl<'s> Evaluator<'s> {
    pub fn new(minify: bool, sprites: &'s mut dyn SpriteSource) -> Self {
        Self {
            context: Context::new(minify),
            sprites,
            importer: ImportResolver::new(),
        }
    }

    pub fn with_importer(mut self, importer: ImportResolver) -> Self {
        self.importer = importer;
        self
    }

    pub fn importer(&self) -> &ImportResolver {
        &self.importer
    }

    /// 解析调用方提供的变量文本并优先绑定。
    pub fn bind_context(
        &mut self,
        values: &IndexMap<String, String>,
        base_dir: Option<&Path>,
    ) -> CcssResult<()> {
        for (name, text) in values {
            let expr = parse_expression(text, 1, base_dir)?;
            self.context.bind(name.clone(), expr);
        }
        Ok(())
    }

    /// 编译一份源码：先递归加载全部导入并合并变量，再按导入优先的顺序求值规则。
    pub fn evaluate_source(
        &mut self,
        source: &str,
        base_dir: Option<&Path>,
    ) -> CcssResult<Vec<EvaluatedRule>> {
        let tree = self.load(source, base_dir.map(Path::to_path_buf), None)?;
        let mut output = Vec::new();
        self.evaluate_tree(&tree, &mut output)?;
        Ok(output)
    }

    fn load(
        &mut self,
        source: &str,
        base_dir: Option<PathBuf>,
        path: Option<PathBuf>,
    ) -> CcssResult<LoadedSheet> {
        let stylesheet = parser::parse(source, base_dir.as_deref())
            .map_err(|err| attach_path(err, path.as_deref()))?;
        for (name, expr) in &stylesheet.variables {
            self.context.define_default(name, expr);
        }
        let mut imports = Vec::with_capacity(stylesheet.imports.len());
        for import in &stylesheet.imports {
            let (import_path, content) = self
                .importer
                .enter(&import.target, base_dir.as_deref(), import.line)
                .map_err(|err| attach_path(err, path.as_deref()))?;
            let dir = import_path.parent().map(Path::to_path_buf);
            let loaded = self.load(&content, dir, Some(import_path));
            self.importer.finish();
            imports.push(loaded?);
        }
        Ok(LoadedSheet {
            path,
            stylesheet,
            imports,
        })
    }

    fn evaluate_tree(
        &mut self,
        sheet: &LoadedSheet,
        output: &mut Vec<EvaluatedRule>,
    ) -> CcssResult<()> {
        for import in &sheet.imports {
            self.evaluate_tree(import, output)?;
        }
        for rule in &sheet.stylesheet.rules {
            let evaluated = self
                .evaluate_rule(rule)
                .map_err(|err| attach_path(err, sheet.path.as_deref()))?;
            output.push(evaluated);
        }
        Ok(())
    }

    fn evaluate_rule(&mut self, rule: &FlatRule) -> CcssResult<EvaluatedRule> {
        let minify = self.context.minify();
        let mut declarations = Vec::with_capacity(rule.properties.len());
        for property in &rule.properties {
            let value = self.eval(&property.value)?.to_css(minify);
            match VENDOR_PREFIXES.get(property.name.as_str()) {
                Some(prefixes) => {
                    for prefix in prefixes.iter() {
                        declarations.push(EvaluatedDeclaration {
                            name: format!("-{prefix}-{}", property.name),
                            value: value.clone(),
                        });
                    }
                }
                None => declarations.push(EvaluatedDeclaration {
                    name: property.name.clone(),
                    value,
                }),
            }
        }
        Ok(EvaluatedRule {
            media: rule.media.clone(),
            selectors: rule.selectors.clone(),
            declarations,
        })
    }

    pub fn eval(&mut self, expr: &Expr) -> CcssResult<Value> {
        let line = expr.line;
        let minify = self.context.minify();
        Ok(match &expr.kind {
            ExprKind::Number(value) => Value::Number(*value),
            ExprKind::Dimension(value, unit) => Value::Dimension(*value, unit.clone()),
            ExprKind::Color(color) => Value::Color(color.clone()),
            ExprKind::String(text) => Value::String(text.clone()),
            ExprKind::Url(text) => Value::Url(text.clone()),
            ExprKind::Backstring(text) => Value::Backstring(text.clone()),
            ExprKind::List(items) => Value::List(self.eval_all(items)?),
            ExprKind::Concat(items) => Value::Concat(self.eval_all(items)?),
            ExprKind::Var(name) => self.resolve(name, line)?,
            ExprKind::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                left.binary(*op, right, line, minify)?
            }
            ExprKind::Neg(inner) => self.eval(inner)?.negate(line)?,
            ExprKind::Call {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval(receiver)?;
                let args = self.eval_all(args)?;
                self.call(receiver, method, args, line)?
            }
            ExprKind::Rgb(channels) => {
                let [r, g, b] = self.rgb_channels(&channels[..3], line)?;
                Value::Color(Color::rgb(r, g, b))
            }
            ExprKind::Rgba(channels) => {
                let [r, g, b] = self.rgb_channels(&channels[..3], line)?;
                let alpha = match self.eval(&channels[3])? {
                    Value::Number(value) => value,
                    Value::Dimension(value, unit) if unit == "%" => value / 100.0,
                    other => {
                        return Err(CcssError::eval(
                            line,
                            format!("invalid alpha value of type {}", other.type_name()),
                        ))
                    }
                };
                if !(0.0..=1.0).contains(&alpha) {
                    return Err(CcssError::eval(
                        line,
                        "alpha channel must be between 0 and 1",
                    ));
                }
                Value::Rgba(Color::rgb(r, g, b), alpha)
            }
            ExprKind::SpriteMap { path, base_dir } => {
                let relative = self.eval(path)?.text(minify);
                let full = match base_dir {
                    Some(dir) => dir.join(&relative),
                    None => PathBuf::from(&relative),
                };
                Value::SpriteMap(self.sprites.load_map(&full, line)?)
            }
            ExprKind::Sprite { map, name } => {
                let map = self.eval(map)?;
                let name = self.eval(name)?.text(minify);
                match map {
                    Value::SpriteMap(map) => self.sprite(&map, name, line)?,
                    other => {
                        return Err(CcssError::eval(
                            line,
                            format!(
                                "{} objects don't have a method called sprite",
                                other.type_name()
                            ),
                        ))
                    }
                }
            }
        })
    }

    fn eval_all(&mut self, items: &[Expr]) -> CcssResult<Vec<Value>> {
        items.iter().map(|item| self.eval(item)).collect()
    }

    /// 查找变量；正在解析中的变量再次出现即为循环依赖。
    fn resolve(&mut self, name: &str, line: usize) -> CcssResult<Value> {
        if self.context.resolving.iter().any(|active| active == name) {
            return Err(CcssError::eval(
                line,
                format!("circular variable dependency detected when resolving {name}"),
            ));
        }
        let expr = self
            .context
            .variables
            .get(name)
            .cloned()
            .ok_or_else(|| CcssError::eval(line, format!("variable {name} is not defined")))?;
        self.context.resolving.push(name.to_string());
        let result = self.eval(&expr);
        self.context.resolving.pop();
        result
    }

    fn call(
        &mut self,
        receiver: Value,
        method: &str,
        args: Vec<Value>,
        line: usize,
    ) -> CcssResult<Value> {
        match (receiver, method) {
            (Value::String(text), "eval") => {
                let expr = parse_expression(&text, line, None)?;
                self.eval(&expr)
            }
            (Value::SpriteMap(map), "sprite") => match <[Value; 1]>::try_from(args) {
                Ok([name]) => {
                    let name = name.text(self.context.minify());
                    self.sprite(&map, name, line)
                }
                Err(args) => Err(CcssError::eval(
                    line,
                    format!("sprite() takes exactly 1 argument ({} given)", args.len()),
                )),
            },
            (receiver, _) => receiver.call_method(method, args, line, self.context.minify()),
        }
    }

    fn sprite(&mut self, map: &Rc<SpriteMap>, name: String, line: usize) -> CcssResult<Value> {
        let bbox = self.sprites.resolve(map, &name).ok_or_else(|| {
            CcssError::eval(line, format!("Couldn't find sprite {name:?} in mapping"))
        })?;
        let url = self.sprites.sprite_url(map, &name);
        Ok(Value::Sprite(Sprite { name, bbox, url }))
    }

    fn rgb_channels(&mut self, channels: &[Expr], line: usize) -> CcssResult<[u8; 3]> {
        let mut result = [0u8; 3];
        for (slot, channel) in result.iter_mut().zip(channels) {
            let value = match self.eval(channel)? {
                Value::Number(value) => value.trunc(),
                Value::Dimension(value, unit) if unit == "%" => (value / 100.0 * 255.0).trunc(),
                other => {
                    return Err(CcssError::eval(
                        line,
                        format!("invalid rgb channel of type {}", other.type_name()),
                    ))
                }
            };
            if !(0.0..=255.0).contains(&value) {
                return Err(CcssError::eval(
                    line,
                    "rgb channel values must be between 0 and 255",
                ));
            }
            *slot = value as u8;
        }
        Ok(result)
    }
}

/// 在导入文件内发生的错误补上文件路径。
fn attach_path(err: CcssError, path: Option<&Path>) -> CcssError {
    let Some(path) = path else {
        return err;
    };
    let message = format!("{} (in {})", err.message(), path.display());
    match err {
        CcssError::Parse { line, .. } => CcssError::Parse { line, message },
        CcssError::Eval { line, .. } => CcssError::Eval { line, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::RecordingSpriteSource;

    fn run(source: &str, context: &[(&str, &str)]) -> CcssResult<Vec<EvaluatedRule>> {
        let mut sprites = RecordingSpriteSource::new();
        let mut evaluator = Evaluator::new(false, &mut sprites);
        let context: IndexMap<String, String> = context
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        evaluator.bind_context(&context, None)?;
        evaluator.evaluate_source(source, None)
    }

    fn values(source: &str) -> Vec<(String, String)> {
        run(source, &[])
            .unwrap()
            .into_iter()
            .flat_map(|rule| rule.declarations)
            .map(|decl| (decl.name, decl.value))
            .collect()
    }

    fn value(expr: &str) -> String {
        values(&format!("a:\n  x: {expr}\n")).remove(0).1
    }

    #[test]
    fn arithmetic_renders_like_css() {
        assert_eq!(value("2px + 2px"), "4px");
        assert_eq!(value("1px+1"), "2px");
        assert_eq!(value("5+5px"), "10px");
        assert_eq!(value("4px-5px"), "-1px");
        assert_eq!(value("0 - 5px"), "-5px");
        assert_eq!(value(".3"), "0.3");
        assert_eq!(value("1cm + 10mm"), "2cm");
        assert_eq!(value("0px -1px 8px #fff"), "0px -1px 8px #ffffff");
        assert_eq!(value("(1 + 2) * 3"), "9");
    }

    #[test]
    fn rendered_literals_parse_back_to_the_same_value() {
        for minify in [false, true] {
            let mut sprites = RecordingSpriteSource::new();
            let mut evaluator = Evaluator::new(minify, &mut sprites);
            let mut eval = |source: &str| {
                let expr = parse_expression(source, 1, None).unwrap();
                evaluator.eval(&expr).unwrap()
            };
            for source in ["0.3", "-.5em", "12", "#eee", "#336699", "red", "2cm", "-4px"] {
                let original = eval(source);
                let rendered = original.to_css(minify);
                assert_eq!(eval(&rendered), original, "{source} rendered as {rendered}");
            }
            for source in ["0.1 + 0.2", "1cm + 1pt", "10 / 3", "#fff.darken(5)"] {
                let rendered = eval(source).to_css(minify);
                assert_eq!(eval(&rendered).to_css(minify), rendered, "{source}");
            }
        }
    }

    #[test]
    fn variables_resolve_lazily() {
        let decls = values("b = $a * 2\na = 3px\nx:\n  y: $b\n");
        assert_eq!(decls, vec![("y".to_string(), "6px".to_string())]);
    }

    #[test]
    fn circular_variables_fail() {
        let err = run("a = $b\nb = $a\nx:\n  y: $a\n", &[]).unwrap_err();
        assert!(matches!(err, CcssError::Eval { .. }));
        assert_eq!(
            err.message(),
            "circular variable dependency detected when resolving a"
        );
    }

    #[test]
    fn undefined_variable_fails_with_line() {
        let err = run("x:\n  y: 1\n  z: $nope\n", &[]).unwrap_err();
        assert_eq!(err, CcssError::eval(3, "variable nope is not defined"));
    }

    #[test]
    fn caller_context_wins_over_defaults() {
        let rules = run("color = red\nbody:\n  color: $color\n", &[("color", "#eee")]).unwrap();
        assert_eq!(rules[0].declarations[0].value, "#eeeeee");
        let rules = run("base = 2px\nbody:\n  width: $w\n", &[("w", "$base * 2")]).unwrap();
        assert_eq!(rules[0].declarations[0].value, "4px");
    }

    #[test]
    fn vendor_prefixes_replace_the_bare_property() {
        let decls = values("a:\n  border-radius: 3px\n  user-select: none\n");
        let names: Vec<_> = decls.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "-moz-border-radius",
                "-webkit-border-radius",
                "-moz-user-select",
                "-webkit-user-select",
                "-ms-user-select"
            ]
        );
        assert!(decls.iter().take(2).all(|(_, value)| value == "3px"));
    }

    #[test]
    fn rgb_and_rgba_channels() {
        assert_eq!(value("rgb(255, 0, 50%)"), "#ff007f");
        assert_eq!(value("rgba(0, 255, 100%, .3)"), "rgba(0, 255, 255, 0.3)");
        let err = run("a:\n  x: rgb(256, 0, 0)\n", &[]).unwrap_err();
        assert!(err.message().contains("between 0 and 255"));
        assert!(run("a:\n  x: rgba(0, 0, 0, 2)\n", &[]).is_err());
    }

    #[test]
    fn string_eval_and_methods() {
        assert_eq!(value("'1px + 2px'.eval()"), "3px");
        assert_eq!(value("'abc'.upper()"), "ABC");
        assert_eq!(value("red.darken(10)"), "#cc0000");
        assert_eq!(value("1px.type()"), "dimension");
        assert_eq!(value("#fff.mix(#000, 50%)"), "#808080");
    }

    #[test]
    fn backstrings_pass_through() {
        assert_eq!(
            value("`-webkit-gradient(linear, left top, left bottom)`"),
            "-webkit-gradient(linear, left top, left bottom)"
        );
    }

    #[test]
    fn recording_sprites_render_placeholder_urls() {
        let decls = values("a:\n  background: spritemap('ui.map').sprite('logo')\n  w: spritemap('ui.map').sprite('logo').width()\n");
        assert_eq!(decls[0].1, "url(<annotated logo>) -0px -0px");
        assert_eq!(decls[1].1, "100px");
    }

    #[test]
    fn sprite_on_non_map_fails() {
        let err = run("a:\n  x: 'a'.sprite('b')\n", &[]).unwrap_err();
        assert_eq!(err.message(), "string objects don't have a method called sprite");
    }

    #[test]
    fn division_by_zero_is_an_eval_error() {
        let err = run("a:\n  x: 1px / 0\n", &[]).unwrap_err();
        assert_eq!(err, CcssError::eval(2, "divide by zero"));
    }
}
