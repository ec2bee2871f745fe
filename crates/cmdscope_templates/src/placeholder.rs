//! Template placeholder grammar.
//!
//! `${name}` is required, `${?name}` optional and `${@name}` an array spread.
//! `\$` produces a literal `$`. Every other backslash sequence is left in the
//! text as written; those belong to the reference grammar and are judged when
//! the bound command is expanded.

use std::fmt;

use cmdscope_spec::{check_name_syntax, SpecError};

use crate::error::{TemplateError, TemplateResult};

const OPEN: &str = "${";

/// How a placeholder consumes its parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    Required,
    Optional,
    ArraySpread,
}

/// A single `${...}` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    pub name: String,
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.kind {
            PlaceholderKind::Required => "",
            PlaceholderKind::Optional => "?",
            PlaceholderKind::ArraySpread => "@",
        };
        write!(f, "${{{}{}}}", marker, self.name)
    }
}

/// A piece of a template field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPart {
    Text(String),
    Placeholder(Placeholder),
}

/// A parsed template field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedField {
    pub parts: Vec<FieldPart>,
}

impl ParsedField {
    /// The placeholder, when it is the field's only content.
    pub fn sole_placeholder(&self) -> Option<&Placeholder> {
        match self.parts.as_slice() {
            [FieldPart::Placeholder(p)] => Some(p),
            _ => None,
        }
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.parts.iter().filter_map(|part| match part {
            FieldPart::Placeholder(p) => Some(p),
            FieldPart::Text(_) => None,
        })
    }

    pub fn has_placeholders(&self) -> bool {
        self.placeholders().next().is_some()
    }
}

/// Parse the placeholders in one template field.
pub fn parse_placeholders(field: &str) -> TemplateResult<ParsedField> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut rest = field;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("\\$") {
            text.push('$');
            rest = after;
        } else if let Some(after) = rest.strip_prefix("\\\\") {
            text.push_str("\\\\");
            rest = after;
        } else if let Some(after) = rest.strip_prefix(OPEN) {
            let end = after
                .find('}')
                .ok_or_else(|| TemplateError::UnclosedPlaceholder {
                    fragment: rest.to_string(),
                })?;
            let placeholder = parse_token(&after[..end], field)?;

            if !text.is_empty() {
                parts.push(FieldPart::Text(std::mem::take(&mut text)));
            }
            parts.push(FieldPart::Placeholder(placeholder));
            rest = &after[end + 1..];
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                text.push(c);
            }
            rest = chars.as_str();
        }
    }

    if !text.is_empty() {
        parts.push(FieldPart::Text(text));
    }

    Ok(ParsedField { parts })
}

fn parse_token(token: &str, field: &str) -> TemplateResult<Placeholder> {
    let (kind, name) = if let Some(name) = token.strip_prefix('?') {
        (PlaceholderKind::Optional, name)
    } else if let Some(name) = token.strip_prefix('@') {
        (PlaceholderKind::ArraySpread, name)
    } else {
        (PlaceholderKind::Required, token)
    };

    check_name_syntax(name).map_err(|e| match e {
        SpecError::EmptyVariableName => TemplateError::EmptyPlaceholderName {
            field: field.to_string(),
        },
        SpecError::InvalidVariableName { name, reason } => {
            TemplateError::InvalidParameterName { name, reason }
        }
        other => TemplateError::InvalidParameterName {
            name: name.to_string(),
            reason: other.to_string(),
        },
    })?;

    Ok(Placeholder {
        kind,
        name: name.to_string(),
    })
}
