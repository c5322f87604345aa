use anyhow::Result;
use doping::{ParameterMap, RenderError, Template, render};

#[test]
fn substitution_replaces_tag_with_value() -> Result<()> {
    let source = "int function(){ int N = /*<DOPING N >*/; return N; }";
    let rendered = render(source, &ParameterMap::parse("N:10")?)?;
    assert!(rendered.as_str().contains("int N = 10;"));
    Ok(())
}

#[test]
fn conditional_body_follows_flag_value() -> Result<()> {
    let template = Template::parse("/*<DOPING_IF R __restrict >*/")?;
    assert_eq!(template.render(&ParameterMap::parse("R:0")?)?, "");
    assert_eq!(template.render(&ParameterMap::parse("R:1")?)?, "__restrict ");
    Ok(())
}

#[test]
fn unclosed_tag_is_a_parse_error() -> Result<()> {
    let err = render("int n = /*<DOPING N ;\nreturn n;\n", &ParameterMap::parse("N:1")?)
        .expect_err("tag never closes");
    assert!(matches!(err, RenderError::TagParse { .. }));
    Ok(())
}

#[test]
fn tags_inside_literals_and_comments_survive() -> Result<()> {
    let context = ParameterMap::parse("N:1")?;
    let source = "char c = '\\''; const char *s = \"/*<DOPING N >*/\"; // /*<DOPING N >*/\n\
                  /* /*<DOPING N >*/ */ int n = /*<DOPING N >*/;";
    let expected = "char c = '\\''; const char *s = \"/*<DOPING N >*/\"; // /*<DOPING N >*/\n\
                    /* /*<DOPING N >*/ */ int n = 1;";
    assert_eq!(render(source, &context)?, expected);
    Ok(())
}

#[test]
fn matrix_kernel_template_renders_every_tag() -> Result<()> {
    let source = r#"#include "doping_args.h"
DOPING_ENTRY(int64_t it, doping_args *args) {
    double * /*<DOPING_IF RESTRICT __restrict >*/a = DOPING_PTR(double, args, 0);
    for (int i = 0; i < /*<DOPING ROWS >*/; i++)
        for (int j = 0; j < /*<DOPING COLS >*/; j++)
            a[i * /*<DOPING COLS >*/ + j] *= 2.0;
    return 0;
}
"#;
    let template = Template::parse(source)?;
    assert_eq!(template.parameter_names(), vec!["RESTRICT", "ROWS", "COLS"]);

    let rendered = template.render(&ParameterMap::parse("RESTRICT:1,ROWS:4,COLS:8")?)?;
    assert!(rendered.as_str().contains("double * __restrict a"));
    assert!(rendered.as_str().contains("i < 4;"));
    assert!(rendered.as_str().contains("a[i * 8 + j]"));
    assert!(!rendered.as_str().contains("/*<DOPING"));
    Ok(())
}
