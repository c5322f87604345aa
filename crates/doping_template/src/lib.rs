//! Template rendering for doping loop sources.
//!
//! Templates are ordinary C/C++ text carrying two tag forms that stay valid
//! comments for editors and compilers:
//!
//! * `/*<DOPING NAME >*/` is replaced by the value of `NAME`.
//! * `/*<DOPING_IF NAME BODY >*/` emits `BODY` unless `NAME` is `"0"`.
//!
//! Tags inside character literals, string literals and comments are copied
//! through untouched.

pub mod error;
pub mod lexer;
pub mod params;
pub mod span;
pub mod template;

pub use error::{ParameterError, RenderError, TagErrorKind};
pub use lexer::{CONDITIONAL_OPEN, SUBSTITUTION_OPEN, Segment, TAG_CLOSE};
pub use params::ParameterMap;
pub use span::Span;
pub use template::{RenderedSource, Template, render};
