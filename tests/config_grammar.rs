//! Grammars loaded through the config layer

use segmark::config::{load_defaults, Loader};
use segmark::Value;

#[test]
fn default_grammar_parses_example() {
    let parser = load_defaults().unwrap().build().unwrap();
    let text = "Hello **bold** world!\nYou can **try *this* awesome** [link](www.eff.org).";

    let rendered: Vec<(String, Vec<(String, Value)>)> = parser
        .parse(text)
        .map(|s| (s.text, s.params.into_iter().collect()))
        .collect();

    let bold = || ("is_bold".to_string(), Value::Bool(true));
    assert_eq!(
        rendered,
        vec![
            ("Hello ".to_string(), vec![]),
            ("bold".to_string(), vec![bold()]),
            (" world!".to_string(), vec![]),
            (
                "\n".to_string(),
                vec![("segment_type".to_string(), Value::from("LINE_BREAK"))]
            ),
            ("You can ".to_string(), vec![]),
            ("try ".to_string(), vec![bold()]),
            (
                "this".to_string(),
                vec![bold(), ("is_italic".to_string(), Value::Bool(true))]
            ),
            (" awesome".to_string(), vec![bold()]),
            (" ".to_string(), vec![]),
            (
                "link".to_string(),
                vec![("link_target".to_string(), Value::from("http://www.eff.org"))]
            ),
            (".".to_string(), vec![]),
        ]
    );
}

#[test]
fn default_grammar_collapses_whitespace_outside_code() {
    let parser = load_defaults().unwrap().build().unwrap();
    let texts: Vec<_> = parser
        .parse("a   b `c   d`")
        .map(|s| s.text)
        .collect();
    assert_eq!(texts, vec!["a b ", "c   d"]);
}

#[test]
fn custom_grammar_with_transform() {
    let parser = Loader::empty()
        .with_str(
            r#"
            [[tokens]]
            name = "mention"
            start = '@(?P<user>\w+)'
            params = { user = { group = "user", transform = "lowercase" } }
            "#,
        )
        .build()
        .unwrap()
        .build()
        .unwrap();

    let segments: Vec<_> = parser.parse("hi  @Bob").collect();
    assert_eq!(segments[0].text, "hi  ");
    assert_eq!(segments[1].text, "@Bob");
    assert_eq!(segments[1].get("user"), Some(&Value::from("bob")));
}

#[test]
fn invalid_token_pattern_is_reported() {
    let grammar = Loader::empty()
        .with_str(
            r#"
            [[tokens]]
            name = "broken"
            start = '(unclosed'
            "#,
        )
        .build()
        .unwrap();
    assert!(grammar.build().is_err());
}
