use ccss_oxide::{compile, compile_file, CcssError, CompileOptions};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

fn minified() -> CompileOptions {
    CompileOptions {
        minify: true,
        ..CompileOptions::default()
    }
}

fn pretty(src: &str) -> String {
    compile(src, CompileOptions::default()).unwrap()
}

#[test]
fn context_values_are_parsed_as_expressions() {
    let mut options = CompileOptions::default();
    options
        .context
        .insert("background_color".into(), "red.darken(10)".into());
    let src = "body:\n    background-color: $background_color\n";
    assert_eq!(
        compile(src, options.clone()).unwrap(),
        "body {\n  background-color: #cc0000;\n}"
    );
    options.minify = true;
    assert_eq!(compile(src, options).unwrap(), "body{background-color:#c00}");
}

#[test]
fn caller_context_wins_over_defaults() {
    let mut options = minified();
    options.context.insert("color".into(), "red".into());
    let css = compile("color = blue\na:\n  c: $color\n", options).unwrap();
    assert_eq!(css, "a{c:red}");
}

#[test]
fn rgba_and_floats() {
    assert_eq!(
        pretty("body:\n  background-color: rgba(0, 255, 100%, .3)\n"),
        "body {\n  background-color: rgba(0, 255, 255, 0.3);\n}"
    );
    assert_eq!(pretty("body:\n  top: .3\n"), "body {\n  top: 0.3;\n}");
}

#[test]
fn arithmetic_and_signed_literals() {
    let src = "
div:
    margin: -2px -2px
    padding: 2px + 2px
    top: 1px+1
    left: 5+5px
    right: 4px-5px
    bottom: 0 - 5px
    text-shadow: 0px -1px 8px #fff
";
    assert_eq!(
        pretty(src),
        "div {
  margin: -2px -2px;
  padding: 4px;
  top: 2px;
  left: 10px;
  right: -1px;
  bottom: -5px;
  text-shadow: 0px -1px 8px #ffffff;
}"
    );
}

#[test]
fn multiline_selectors() {
    let src = "
ul.item1 li.item1,
ul.item2 li.item2,
ul.item3 li.item3:
    font-weight: bold
";
    assert_eq!(
        pretty(src),
        "ul.item1 li.item1,\nul.item2 li.item2,\nul.item3 li.item3 {\n  font-weight: bold;\n}"
    );
}

#[test]
fn backstrings_are_emitted_verbatim() {
    let src = "
div.round:
    background-image: `-webkit-gradient(top left, bottom right, from(#fff), to(#000))`
";
    assert_eq!(
        pretty(src),
        "div.round {\n  background-image: -webkit-gradient(top left, bottom right, from(#fff), to(#000));\n}"
    );
}

#[test]
fn comments_are_ignored() {
    let src = "/* block */\n/* multi\n*/\n\naa, /* inline */bb:\n    x:1 // trailing\n";
    assert_eq!(compile(src, minified()).unwrap(), "aa,bb{x:1}");
}

#[test]
fn simple_macro() {
    let src = "
def simple:
    color: red
    font-size: 3px+10px
body:
    $simple
    width:200px
.other:
    $simple
";
    assert_eq!(
        pretty(src),
        "body {
  color: red;
  font-size: 13px;
  width: 200px;
}

.other {
  color: red;
  font-size: 13px;
}"
    );
}

#[test]
fn undefined_macro_is_a_parse_error() {
    let src = "
body:
    $simple
    width:200px
";
    let err = compile(src, CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CcssError::Parse { line: 3, .. }));
}

#[test]
fn nested_macros_and_vendor_prefixes() {
    let css = compile_file(fixture("macros.ccss"), minified()).unwrap();
    assert_eq!(
        css,
        ".card{-moz-border-radius:4px;-webkit-border-radius:4px;padding:8px}.card.active{color:red}"
    );
}

#[test]
fn global_media_type() {
    assert_eq!(
        pretty("@media print:\n  a:\n    text-decoration: none\n"),
        "@media print {\n\na {\n  text-decoration: none;\n}\n\n} /* @media print */"
    );
}

#[test]
fn leading_and_trailing_media_types() {
    assert_eq!(
        pretty("@media print:\n  a:\n    text-decoration: none\na:\n  font-weight: bold\n"),
        "@media print {

a {
  text-decoration: none;
}

} /* @media print */



a {
  font-weight: bold;
}"
    );
    assert_eq!(
        pretty("a:\n  font-weight: bold\n@media print:\n  a:\n    text-decoration: none\n"),
        "a {
  font-weight: bold;
}



@media print {

a {
  text-decoration: none;
}

} /* @media print */"
    );
}

#[test]
fn repeated_media_type_shares_a_wrapper() {
    let src = "@media print:\n  strong:\n    font-weight: bold\n@media print:\n  a:\n    text-decoration: none\n";
    assert_eq!(
        pretty(src),
        "@media print {

strong {
  font-weight: bold;
}

a {
  text-decoration: none;
}

} /* @media print */"
    );
    assert_eq!(
        compile(src, minified()).unwrap(),
        "@media print{strong{font-weight:bold}a{text-decoration:none}}"
    );
}

#[test]
fn nested_media_type() {
    let src = "
@media print:
  #content:
    background: none
    @media handheld:
      strong:
        font-weight: bold
  a:
    text-decoration: none
";
    assert_eq!(
        pretty(src),
        "@media print {

#content {
  background: none;
}

} /* @media print */



@media handheld {

#content strong {
  font-weight: bold;
}

} /* @media handheld */



@media print {

a {
  text-decoration: none;
}

} /* @media print */"
    );
}

#[test]
fn imports_are_emitted_before_own_rules() {
    let css = compile_file(fixture("import.ccss"), minified()).unwrap();
    assert_eq!(
        css,
        ".brand{color:#369;border-color:#3d7ab8}.container{width:960px;margin:0 auto}body{color:#369;padding:12px 24px}"
    );
}

#[test]
fn imports_resolve_against_current_dir() {
    let src = "@import \"partials/layout.ccss\"\n";
    let options = CompileOptions {
        current_dir: Some(fixture("")),
        ..CompileOptions::default()
    };
    assert_eq!(
        compile(src, options).unwrap(),
        ".container {\n  width: 960px;\n  margin: 0 auto;\n}"
    );
}

#[test]
fn missing_import_fails() {
    let options = CompileOptions {
        current_dir: Some(fixture("")),
        ..CompileOptions::default()
    };
    let err = compile("\n@import \"nope.ccss\"\n", options).unwrap_err();
    assert_eq!(err, CcssError::parse(2, "file \"nope.ccss\" does not exist"));
}

#[test]
fn import_cycles_are_reported() {
    let err = compile_file(fixture("cycle/a.ccss"), CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CcssError::Parse { line: 1, .. }));
    assert!(err.message().starts_with("circular import"));

    let err = compile_file(fixture("cycle/self.ccss"), CompileOptions::default()).unwrap_err();
    assert!(err.message().starts_with("circular import"));
}

#[test]
fn sprites_from_coordinate_file() {
    let css = compile_file(fixture("sprites.ccss"), CompileOptions::default()).unwrap();
    assert_eq!(
        css,
        ".logo {
  background-image: url(big.png) -0px -0px;
  width: 32px;
}

.icon {
  background: url(big.png) -32px -0px no-repeat;
}"
    );
}

#[test]
fn variable_errors() {
    let err = compile("a:\n  b: $missing\n", CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CcssError::Eval { line: 2, .. }));
    assert!(err.message().contains("missing"));

    let err = compile("x = $y\ny = $x\na:\n  b: $x\n", CompileOptions::default()).unwrap_err();
    assert!(err
        .message()
        .starts_with("circular variable dependency detected when resolving"));
}

#[test]
fn unreadable_entry_file() {
    let err = compile_file(fixture("absent.ccss"), CompileOptions::default()).unwrap_err();
    assert_eq!(err.line(), 0);
}
