use tmpl::{RenderOptions, RenderValue};

const GRAMMAR: &str = include_str!("functions.tmpl");

fn arg(ty: &str, name: &str) -> RenderValue {
    RenderValue::record().set("ty", ty).set("name", name)
}

fn main() {
    let grammar = tmpl::compile(GRAMMAR).expect("failed to compile grammar");
    println!("{grammar}");
    println!("recursive rules: {:?}", grammar.recursive_rules());

    let sum = RenderValue::record()
        .set("lhs", RenderValue::record().set("name", "a"))
        .set("op", "+")
        .set("rhs", RenderValue::record().set("name", "b"));
    let call = RenderValue::record()
        .set("callee", "add")
        .set("args", vec![RenderValue::record().set("value", "1"), sum.clone()]);

    let input = RenderValue::record().set(
        "functions",
        vec![
            RenderValue::record()
                .set("ret", "int")
                .set("name", "add")
                .set("args", vec![arg("int", "a"), arg("int", "b")])
                .set("body", RenderValue::record().set("value", sum)),
            RenderValue::record()
                .set("ret", "int")
                .set("name", "twice")
                .set("args", vec![arg("int", "b")])
                .set("body", RenderValue::record().set("value", call)),
            RenderValue::record()
                .set("ret", "void")
                .set("name", "noop")
                .set("args", RenderValue::sequence(Vec::<RenderValue>::new()))
                .set("body", RenderValue::record()),
        ],
    );

    match grammar.render_main(&input, &RenderOptions::new()) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("render failed: {err}"),
    }
}
