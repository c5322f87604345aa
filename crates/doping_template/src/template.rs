use std::fmt;
use std::ops::Range;

use crate::error::RenderError;
use crate::lexer::{self, Segment};
use crate::params::ParameterMap;

/// Template text together with its scanned segments.
///
/// Scanning happens once in [`Template::parse`]; rendering only walks the
/// segment list, so a template can be rendered against many parameter maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: impl Into<String>) -> Result<Self, RenderError> {
        let source = source.into();
        let segments = lexer::scan(&source)?;
        Ok(Self { source, segments })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names referenced by tags, in order of first use.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            let name = match segment {
                Segment::Substitution { name, .. } | Segment::Conditional { name, .. } => name,
                Segment::Text(_) => continue,
            };
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    pub fn render(&self, context: &ParameterMap) -> Result<RenderedSource, RenderError> {
        let mut output = String::with_capacity(self.source.len());

        for segment in &self.segments {
            match segment {
                Segment::Text(span) => output.push_str(&self.source[Range::from(*span)]),
                Segment::Substitution { name, span } => {
                    let value = lookup(context, name, *span)?;
                    output.push_str(value);
                }
                Segment::Conditional { name, body, span } => {
                    if lookup(context, name, *span)? != "0" {
                        output.push_str(&self.source[Range::from(*body)]);
                    }
                }
            }
        }

        Ok(RenderedSource(output))
    }
}

fn lookup<'a>(
    context: &'a ParameterMap,
    name: &str,
    span: crate::Span,
) -> Result<&'a str, RenderError> {
    context
        .get(name)
        .ok_or_else(|| RenderError::MissingContextKey {
            name: name.to_string(),
            span,
        })
}

/// Renders `source` against `context` in one call.
pub fn render(source: &str, context: &ParameterMap) -> Result<RenderedSource, RenderError> {
    Template::parse(source)?.render(context)
}

/// Template output with every tag resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RenderedSource(String);

impl RenderedSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for RenderedSource {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RenderedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for RenderedSource {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RenderedSource {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TagErrorKind;

    fn context(pairs: &str) -> ParameterMap {
        ParameterMap::parse(pairs).expect("valid parameters")
    }

    #[test]
    fn untagged_source_is_unmodified() {
        let empty = ParameterMap::new();
        let full = context("N:1");
        for source in [
            "Unrelated string",
            "Not closed ' symbol",
            "Not closed \" symbol",
            "Not closed // symbol",
            "Not closed /",
            "Not closed /* symbol",
            "ünïcödé /* ≠ */ 'λ'",
            "",
        ] {
            assert_eq!(render(source, &empty).expect("renders"), source);
            assert_eq!(render(source, &full).expect("renders"), source);
        }
    }

    #[test]
    fn substitution_is_replaced_by_value() {
        let rendered = render("string /*<DOPING N >*/ string", &context("N:1")).expect("renders");
        assert_eq!(rendered, "string 1 string");
    }

    #[test]
    fn extra_spaces_inside_substitution_are_skipped() {
        let rendered = render("a /*<DOPING   N   >*/ b", &context("N:7")).expect("renders");
        assert_eq!(rendered, "a 7 b");
    }

    #[test]
    fn missing_key_is_reported() {
        let err = render("string /*<DOPING N >*/ string", &ParameterMap::new())
            .expect_err("N is undefined");
        assert!(matches!(err, RenderError::MissingContextKey { ref name, .. } if name == "N"));
    }

    #[test]
    fn unclosed_substitution_is_a_parse_error() {
        let err = render("string /*<DOPING N string", &context("N:1")).expect_err("unclosed");
        assert!(err.is_tag_parse());
    }

    #[test]
    fn parse_error_wins_over_missing_key() {
        let err = render("/*<DOPING A >*/ /*<DOPING B", &ParameterMap::new())
            .expect_err("both problems");
        assert!(matches!(
            err,
            RenderError::TagParse {
                kind: TagErrorKind::Unterminated,
                ..
            }
        ));
    }

    #[test]
    fn tags_in_escape_contexts_are_not_expanded() {
        let ctx = context("N:1");
        for source in [
            "string '/*<DOPING N >*/' string",
            "string \"/*<DOPING N >*/\" string",
            "string ///*<DOPING N >*/\n string",
            "string /*/*<DOPING N >*/*/ string",
            "\nstring /* Line1\nLine 2 /*<DOPING N >*/\nLine 3 /*<DOPING N >*/\nLine 4*/\n string\n",
        ] {
            assert_eq!(render(source, &ctx).expect("renders"), source);
        }
    }

    #[test]
    fn conditional_emits_body_unless_zero() {
        let source = "void f(double * /*<DOPING_IF R __restrict >*/a);";
        assert_eq!(
            render(source, &context("R:0")).expect("renders"),
            "void f(double * a);"
        );
        assert_eq!(
            render(source, &context("R:1")).expect("renders"),
            "void f(double * __restrict a);"
        );
        assert_eq!(
            render(source, &context("R:yes")).expect("renders"),
            "void f(double * __restrict a);"
        );
    }

    #[test]
    fn conditional_body_is_verbatim() {
        let source = "/*<DOPING_IF D printf(\"N=%d\\n\", /*<DOPING N); // dbg\n>*/;";
        let rendered = render(source, &context("D:1")).expect("renders");
        assert_eq!(rendered, "printf(\"N=%d\\n\", /*<DOPING N); // dbg\n;");
    }

    #[test]
    fn conditional_requires_its_key() {
        let err = render("/*<DOPING_IF R x >*/", &ParameterMap::new()).expect_err("R undefined");
        assert!(matches!(err, RenderError::MissingContextKey { .. }));
    }

    #[test]
    fn renders_loop_bound_in_c_source() {
        let template_text = "\n\
int sum(){\n\
    int sum; /* Unrelated comment */\n\
    for(int i; i < /*<DOPING N >*/; i++){\n\
        sum += i;\n\
    }\n\
}\n";
        let expected = "\n\
int sum(){\n\
    int sum; /* Unrelated comment */\n\
    for(int i; i < 10; i++){\n\
        sum += i;\n\
    }\n\
}\n";
        assert_eq!(render(template_text, &context("N:10")).expect("renders"), expected);
    }

    #[test]
    fn rendering_is_repeatable() {
        let template = Template::parse("int N = /*<DOPING N >*/;").expect("parses");
        let first = template.render(&context("N:10")).expect("renders");
        let second = template.render(&context("N:10")).expect("renders");
        let other = template.render(&context("N:11")).expect("renders");
        assert_eq!(first, second);
        assert_eq!(first, "int N = 10;");
        assert_eq!(other, "int N = 11;");
    }

    #[test]
    fn parameter_names_in_first_use_order() {
        let template =
            Template::parse("/*<DOPING B >*/ /*<DOPING_IF A x >*/ /*<DOPING B >*/").expect("parses");
        assert_eq!(template.parameter_names(), vec!["B", "A"]);
    }
}
