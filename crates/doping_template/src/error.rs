use thiserror::Error;

use crate::span::Span;

/// What went wrong inside a `/*<DOPING ... >*/` tag.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TagErrorKind {
    #[error("unterminated template tag, expected `>*/` before end of input")]
    Unterminated,
    #[error("invalid character `{0}` in template tag name")]
    InvalidNameCharacter(char),
    #[error("template tag has an empty name")]
    EmptyName,
    #[error("unexpected `{0}` in template tag, expected `>*/`")]
    ExpectedClose(char),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("{kind} (byte {})", span.start())]
    TagParse { kind: TagErrorKind, span: Span },
    #[error("template parameter `{name}` is not defined (byte {})", span.start())]
    MissingContextKey { name: String, span: Span },
}

impl RenderError {
    pub fn span(&self) -> Span {
        match self {
            RenderError::TagParse { span, .. } | RenderError::MissingContextKey { span, .. } => {
                *span
            }
        }
    }

    pub fn is_tag_parse(&self) -> bool {
        matches!(self, RenderError::TagParse { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("empty parameter pair at byte {}", span.start())]
    EmptyPair { span: Span },
    #[error("parameter pair `{pair}` is missing the `:` separator")]
    MissingSeparator { pair: String, span: Span },
    #[error("parameter pair `{pair}` has an empty name")]
    EmptyKey { pair: String, span: Span },
    #[error("invalid character `{ch}` in parameter name `{key}`")]
    InvalidKey { key: String, ch: char, span: Span },
    /// Values may not contain `,` or carry surrounding whitespace, since
    /// neither would survive a round trip through the `A:3,B:6` form.
    #[error("parameter `{key}` has a value `{value}` that cannot be written as `{key}:value`")]
    InvalidValue {
        key: String,
        value: String,
        span: Span,
    },
}

impl ParameterError {
    pub fn span(&self) -> Span {
        match self {
            ParameterError::EmptyPair { span }
            | ParameterError::MissingSeparator { span, .. }
            | ParameterError::EmptyKey { span, .. }
            | ParameterError::InvalidKey { span, .. }
            | ParameterError::InvalidValue { span, .. } => *span,
        }
    }
}
