use std::path::{Component, Path};
use thiserror::Error;

pub const DEFAULT_TEMPLATE: &str = "{base}_{description}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Token(Token),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Base,
    Description,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("テンプレートが空です")]
    Empty,
    #[error("中括弧の対応が不正です")]
    UnbalancedBraces,
    #[error("未対応のプレースホルダーです: {0}")]
    UnknownPlaceholder(String),
    #[error("ファイル名として使えない結果になりました: {0}")]
    InvalidFileName(String),
}

/// Values substituted into a naming template for one file.
#[derive(Debug, Clone, Copy)]
pub struct NameFields<'a> {
    pub base: &'a str,
    pub description: &'a str,
}

pub fn validate_template(input: &str) -> Result<(), TemplateError> {
    parse_template(input).map(|_| ())
}

pub fn parse_template(input: &str) -> Result<Vec<TemplatePart>, TemplateError> {
    if input.is_empty() {
        return Err(TemplateError::Empty);
    }

    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                if !literal.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                }
                let mut name = String::new();
                let mut found_close = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        found_close = true;
                        break;
                    }
                    if next == '{' {
                        return Err(TemplateError::UnbalancedBraces);
                    }
                    name.push(next);
                }
                if !found_close {
                    return Err(TemplateError::UnbalancedBraces);
                }
                parts.push(TemplatePart::Token(parse_token(&name)?));
            }
            '}' => return Err(TemplateError::UnbalancedBraces),
            _ => literal.push(ch),
        }
    }

    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }

    Ok(parts)
}

pub fn render_template(parts: &[TemplatePart], fields: &NameFields<'_>) -> String {
    let mut output = String::new();
    for part in parts {
        match part {
            TemplatePart::Literal(s) => output.push_str(s),
            TemplatePart::Token(Token::Base) => output.push_str(fields.base),
            TemplatePart::Token(Token::Description) => output.push_str(fields.description),
        }
    }
    output
}

/// Parses `template`, substitutes `fields` and appends `extension_with_dot` verbatim.
/// Nothing is substituted when the template is invalid, and the result must be a
/// single file name (no separators, no `.`/`..`).
pub fn render_file_name(
    template: &str,
    fields: &NameFields<'_>,
    extension_with_dot: &str,
) -> Result<String, TemplateError> {
    let parts = parse_template(template)?;
    let name = format!(
        "{}{}",
        render_template(&parts, fields),
        extension_with_dot
    );
    if !is_single_file_name(&name) {
        return Err(TemplateError::InvalidFileName(name));
    }
    Ok(name)
}

fn is_single_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(first)), None) if first == name
    )
}

fn parse_token(name: &str) -> Result<Token, TemplateError> {
    match name {
        "base" => Ok(Token::Base),
        "description" => Ok(Token::Description),
        other => Err(TemplateError::UnknownPlaceholder(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> NameFields<'static> {
        NameFields {
            base: "foo",
            description: "bar-baz",
        }
    }

    #[test]
    fn render_default_template() {
        let name = render_file_name(DEFAULT_TEMPLATE, &fields(), ".png").expect("must render");
        assert_eq!(name, "foo_bar-baz.png");
    }

    #[test]
    fn render_description_only() {
        let name = render_file_name("{description}", &fields(), ".JPG").expect("must render");
        assert_eq!(name, "bar-baz.JPG");
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let err = render_file_name("{base}_{date}", &fields(), ".png").expect_err("must fail");
        assert_eq!(err, TemplateError::UnknownPlaceholder("date".to_string()));
    }

    #[test]
    fn empty_placeholder_is_rejected() {
        let err = parse_template("{}").expect_err("must fail");
        assert_eq!(err, TemplateError::UnknownPlaceholder(String::new()));
    }

    #[test]
    fn unbalanced_braces_are_rejected() {
        assert_eq!(
            parse_template("{base").expect_err("must fail"),
            TemplateError::UnbalancedBraces
        );
        assert_eq!(
            parse_template("base}").expect_err("must fail"),
            TemplateError::UnbalancedBraces
        );
    }

    #[test]
    fn empty_template_is_rejected() {
        assert_eq!(
            validate_template("").expect_err("must fail"),
            TemplateError::Empty
        );
    }

    #[test]
    fn path_separators_are_rejected() {
        for template in ["../../{base}_{description}", "{base}/deep/{description}", "/{base}"] {
            let err = render_file_name(template, &fields(), ".png").expect_err("must fail");
            assert!(matches!(err, TemplateError::InvalidFileName(_)), "{template}");
        }
    }

    #[test]
    fn dot_names_are_rejected() {
        let err = render_file_name("..", &fields(), "").expect_err("must fail");
        assert_eq!(err, TemplateError::InvalidFileName("..".to_string()));
    }

    #[test]
    fn doubled_braces_are_literal() {
        let name = render_file_name("{{{base}}}", &fields(), ".png").expect("must render");
        assert_eq!(name, "{foo}.png");
    }
}
