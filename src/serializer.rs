use crate::evaluator::{EvaluatedDeclaration, EvaluatedRule};
use crate::utils::indent;

/// 负责将扁平化的规则转换为最终 CSS 文本。
pub struct Serializer {
    minify: bool,
}

/// 媒体查询相同的一段连续规则。
struct Group<'a> {
    media: Option<&'a str>,
    rules: Vec<&'a EvaluatedRule>,
}

impl Serializer {
    pub fn new(minify: bool) -> Self {
        Self { minify }
    }

    pub fn to_css(&self, rules: &[EvaluatedRule]) -> String {
        let groups = group_by_media(rules);
        if self.minify {
            self.render_minified(&groups)
        } else {
            self.render_pretty(&groups)
        }
    }

    fn render_pretty(&self, groups: &[Group<'_>]) -> String {
        let rendered: Vec<String> = groups
            .iter()
            .map(|group| {
                let blocks = group
                    .rules
                    .iter()
                    .map(|rule| self.render_rule_pretty(rule))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                match group.media {
                    Some(query) => format!("@media {query} {{\n\n{blocks}\n\n}} /* @media {query} */"),
                    None => blocks,
                }
            })
            .collect();
        rendered.join("\n\n\n\n")
    }

    fn render_rule_pretty(&self, rule: &EvaluatedRule) -> String {
        let mut output = rule.selectors.join(",\n");
        output.push_str(" {\n");
        for decl in &rule.declarations {
            output.push_str(&indent(1));
            output.push_str(&self.format_declaration(decl));
            output.push('\n');
        }
        output.push('}');
        output
    }

    fn render_minified(&self, groups: &[Group<'_>]) -> String {
        let mut output = String::new();
        for group in groups {
            if let Some(query) = group.media {
                output.push_str("@media ");
                output.push_str(query);
                output.push('{');
            }
            for rule in &group.rules {
                self.render_rule_minified(rule, &mut output);
            }
            if group.media.is_some() {
                output.push('}');
            }
        }
        output
    }

    fn render_rule_minified(&self, rule: &EvaluatedRule, output: &mut String) {
        output.push_str(&rule.selectors.join(","));
        output.push('{');
        for (idx, decl) in rule.declarations.iter().enumerate() {
            if idx > 0 {
                output.push(';');
            }
            output.push_str(&self.format_declaration_minified(decl));
        }
        output.push('}');
    }

    fn format_declaration(&self, decl: &EvaluatedDeclaration) -> String {
        format!("{}: {};", decl.name, decl.value)
    }

    fn format_declaration_minified(&self, decl: &EvaluatedDeclaration) -> String {
        format!("{}:{}", decl.name, decl.value)
    }
}

/// 相邻且媒体查询相同的规则归入同一组。
fn group_by_media(rules: &[EvaluatedRule]) -> Vec<Group<'_>> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for rule in rules {
        let media = rule.media.as_deref();
        match groups.last_mut() {
            Some(group) if group.media == media => group.rules.push(rule),
            _ => groups.push(Group {
                media,
                rules: vec![rule],
            }),
        }
    }
    groups
}
