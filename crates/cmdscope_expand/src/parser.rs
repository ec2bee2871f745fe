//! Reference grammar.
//!
//! `%{NAME}` is a reference. `\%` and `\\` are escapes for a literal `%` and
//! `\`. Any other character after a backslash is an error, as is a trailing
//! backslash. A `%` not followed by `{` is literal text.

use cmdscope_spec::is_name_char;

use crate::error::{ExpandError, ExpandResult};

pub const ESCAPE: char = '\\';
pub const REFERENCE_OPEN: &str = "%{";
pub const REFERENCE_CLOSE: char = '}';

/// A piece of a parsed string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text with escapes already resolved
    Literal(String),
    /// A reference; `position` is the byte offset of its `%{`
    Reference { name: String, position: usize },
}

/// Split `raw` into literal text and references.
pub fn parse_references(raw: &str) -> ExpandResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = raw.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some((_, next @ ('%' | ESCAPE))) => literal.push(next),
                Some((_, other)) => {
                    return Err(ExpandError::InvalidEscapeSequence {
                        sequence: format!("{}{}", ESCAPE, other),
                        position,
                    })
                }
                None => {
                    return Err(ExpandError::InvalidEscapeSequence {
                        sequence: ESCAPE.to_string(),
                        position,
                    })
                }
            },
            '%' if matches!(chars.peek(), Some((_, '{'))) => {
                let start = position + REFERENCE_OPEN.len();
                let end = raw[start..]
                    .find(REFERENCE_CLOSE)
                    .map(|offset| start + offset)
                    .ok_or_else(|| ExpandError::UnclosedVariableReference {
                        fragment: raw[position..].to_string(),
                    })?;

                let name = &raw[start..end];
                if name.is_empty() {
                    return Err(ExpandError::EmptyVariableName { position });
                }
                if !name.chars().all(is_name_char) {
                    return Err(ExpandError::InvalidVariableName {
                        name: name.to_string(),
                        position,
                    });
                }

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Reference {
                    name: name.to_string(),
                    position,
                });

                while chars.next_if(|(i, _)| *i <= end).is_some() {}
            }
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

/// Names referenced by `raw`, in order of appearance, without duplicates.
pub fn collect_references(raw: &str) -> ExpandResult<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for segment in parse_references(raw)? {
        if let Segment::Reference { name, .. } = segment {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    Ok(names)
}
