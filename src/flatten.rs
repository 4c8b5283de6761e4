use crate::ast::{Declaration, FlatRule, MacroDef, Property, RawRule};
use crate::error::{CcssError, CcssResult};
use crate::expr::parse_expression;
use crate::utils::split_top_level;
use indexmap::IndexMap;
use std::path::Path;

const MEDIA_PREFIX: &str = "@media ";

/// 把规则树展开成扁平规则列表，同时展开宏调用并解析属性表达式。
///
/// 选择器栈每层是一组并列选择器，输出的选择器是各层的笛卡尔积；
/// `@media` 节点只压入媒体栈，不参与选择器组合。
pub struct Flattener<'a> {
    macros: &'a IndexMap<String, MacroDef>,
    base_dir: Option<&'a Path>,
    selectors: Vec<Vec<String>>,
    media: Vec<String>,
    output: Vec<FlatRule>,
}

impl<'a> Flattener<'a> {
    pub fn new(macros: &'a IndexMap<String, MacroDef>, base_dir: Option<&'a Path>) -> Self {
        Self {
            macros,
            base_dir,
            selectors: Vec::new(),
            media: Vec::new(),
            output: Vec::new(),
        }
    }

    pub fn flatten(mut self, rules: &[RawRule]) -> CcssResult<Vec<FlatRule>> {
        for rule in rules {
            self.handle_rule(rule)?;
        }
        Ok(self.output)
    }

    fn handle_rule(&mut self, rule: &RawRule) -> CcssResult<()> {
        if let Some(query) = rule.selector.strip_prefix(MEDIA_PREFIX) {
            self.media.push(query.trim().to_string());
            let result = self.emit(rule);
            self.media.pop();
            return result;
        }

        let (references, locals): (Vec<String>, Vec<String>) = split_top_level(&rule.selector)
            .into_iter()
            .partition(|selector| selector.contains('&'));

        if !locals.is_empty() {
            self.selectors.push(locals);
            let result = self.emit(rule);
            self.selectors.pop();
            result?;
        }

        if !references.is_empty() {
            let parent = self.selectors.pop();
            let candidates = parent.clone().unwrap_or_else(|| vec!["*".to_string()]);
            let level = candidates
                .iter()
                .flat_map(|candidate| {
                    references
                        .iter()
                        .map(move |template| template.replace('&', candidate))
                })
                .collect();
            self.selectors.push(level);
            let result = self.emit(rule);
            self.selectors.pop();
            if let Some(parent) = parent {
                self.selectors.push(parent);
            }
            result?;
        }
        Ok(())
    }

    /// 先输出本节点的声明，再按源码顺序处理子规则。
    fn emit(&mut self, rule: &RawRule) -> CcssResult<()> {
        let mut properties = Vec::new();
        self.expand(&rule.declarations, &mut Vec::new(), &mut properties)?;
        if !properties.is_empty() {
            if self.selectors.is_empty() {
                return Err(CcssError::parse(
                    rule.line,
                    "definitions inside @media must be wrapped in a rule",
                ));
            }
            self.output.push(FlatRule {
                media: self.media.last().cloned(),
                selectors: self.current_selectors(),
                properties,
            });
        }
        for child in &rule.children {
            self.handle_rule(child)?;
        }
        Ok(())
    }

    fn expand(
        &self,
        declarations: &[Declaration],
        active: &mut Vec<String>,
        output: &mut Vec<Property>,
    ) -> CcssResult<()> {
        for declaration in declarations {
            match declaration {
                Declaration::Property { line, name, value } => output.push(Property {
                    line: *line,
                    name: name.clone(),
                    value: parse_expression(value, *line, self.base_dir)?,
                }),
                Declaration::MacroCall { line, name } => {
                    let def = self.macros.get(name).ok_or_else(|| {
                        CcssError::parse(*line, format!("undefined macro \"{name}\""))
                    })?;
                    if active.contains(name) {
                        return Err(CcssError::parse(
                            *line,
                            format!("recursive macro call \"{name}\""),
                        ));
                    }
                    active.push(name.clone());
                    self.expand(&def.declarations, active, output)?;
                    active.pop();
                }
            }
        }
        Ok(())
    }

    /// 各层选择器的笛卡尔积，较新一层的选择器在外层循环。
    fn current_selectors(&self) -> Vec<String> {
        let mut branches: Vec<Vec<&str>> = vec![Vec::new()];
        for level in &self.selectors {
            let mut next = Vec::with_capacity(branches.len() * level.len());
            for selector in level {
                for branch in &branches {
                    let mut extended = branch.clone();
                    extended.push(selector.as_str());
                    next.push(extended);
                }
            }
            branches = next;
        }
        branches.into_iter().map(|branch| branch.join(" ")).collect()
    }
}
