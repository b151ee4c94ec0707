#![cfg(feature = "json")]

use serde_json::json;
use tmpl::{RenderError, RenderValue};

const SOURCE: &str = include_str!("../demos/functions.tmpl");

#[test]
fn render_from_json_document() {
    let grammar = tmpl::compile(SOURCE).unwrap();
    let doc = json!({
        "functions": [
            {
                "ret": "int",
                "name": "answer",
                "args": [],
                "body": { "value": { "value": 42 } }
            },
            {
                "ret": "void",
                "name": "log",
                "args": [{ "ty": "str", "name": "msg" }],
                "body": { "value": null }
            }
        ]
    });
    let out = grammar.render("Main", &RenderValue::from(doc)).unwrap();
    assert_eq!(
        out,
        "int answer() {\n    return 42;\n}\n\nvoid log(str msg) {\n    return;\n}"
    );
}

#[test]
fn json_null_is_absent() {
    let grammar = tmpl::compile("Opt: \"x \" <val:ident>?;\n~~~").unwrap();
    let out = grammar
        .render("Opt", &RenderValue::from(json!({ "val": null })))
        .unwrap();
    assert_eq!(out, "x ");
}

#[test]
fn json_shape_mismatch_reports_path() {
    let grammar = tmpl::compile(SOURCE).unwrap();
    let doc = json!({
        "functions": [
            { "ret": "int", "name": "f", "args": [{ "ty": "int" }], "body": {} }
        ]
    });
    assert_eq!(
        grammar.render("Main", &RenderValue::from(doc)),
        Err(RenderError::NoMatchingAlternative {
            rule: "ArgDef".into(),
            path: "Main.functions[0].args[0]".into(),
        })
    );
}
