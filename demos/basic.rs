use tmpl::{GrammarBuilder, Modifier, RenderValue};

fn main() {
    // Define rules
    let grammar = GrammarBuilder::new()
        .rule("Call", |r| {
            r.alt(|a| {
                a.slot("callee", "ident")
                    .lit("(")
                    .slot_with("args", "Arg", Modifier::separated(", "))
                    .lit(")")
            })
        })
        .rule("Arg", |r| {
            r.alt(|a| a.inline("int", Modifier::Once))
                .alt(|a| a.lit("\"").inline("string", Modifier::Once).lit("\""))
        })
        .compile()
        .expect("failed to compile grammar");

    println!("{grammar}");

    // Render against an input value
    let input = RenderValue::record()
        .set("callee", "printf")
        .set("args", vec![RenderValue::from("%d\\n"), RenderValue::from(42_i64)]);

    match grammar.render("Call", &input) {
        Ok(text) => println!("Result: {text}"),
        Err(err) => println!("Render failed: {err}"),
    }
}
