use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tmpl::{CompiledGrammar, GrammarBuilder, Modifier, RenderOptions, RenderValue};

const FIXTURE: &str = include_str!("../demos/functions.tmpl");

fn functions_input(n: usize) -> RenderValue {
    let functions: Vec<RenderValue> = (0..n)
        .map(|i| {
            let sum = RenderValue::record()
                .set("lhs", RenderValue::record().set("name", "a"))
                .set("op", "+")
                .set("rhs", RenderValue::record().set("value", i as i64));
            RenderValue::record()
                .set("ret", "int")
                .set("name", format!("f{i}"))
                .set(
                    "args",
                    vec![RenderValue::record().set("ty", "int").set("name", "a")],
                )
                .set("body", RenderValue::record().set("value", sum))
        })
        .collect();
    RenderValue::record().set("functions", functions)
}

fn nested_expr(depth: usize) -> RenderValue {
    let mut value = RenderValue::record().set("value", "0");
    for _ in 0..depth {
        value = RenderValue::record()
            .set("lhs", value)
            .set("op", "+")
            .set("rhs", RenderValue::record().set("name", "x"));
    }
    value
}

fn bench_render(c: &mut Criterion) {
    let grammar = CompiledGrammar::from_source(FIXTURE).unwrap();
    let mut group = c.benchmark_group("render");

    for &n in &[1, 10, 100] {
        let input = functions_input(n);
        group.bench_function(&format!("{n}_functions"), |b| {
            b.iter(|| grammar.render("Main", black_box(&input)).unwrap());
        });
    }

    let options = RenderOptions::new().max_depth(1_000);
    for &depth in &[10, 100, 500] {
        let input = nested_expr(depth);
        group.bench_function(&format!("expr_depth_{depth}"), |b| {
            b.iter(|| grammar.render_with("Expr", black_box(&input), &options).unwrap());
        });
    }

    group.finish();
}

fn bench_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("compilation");

    group.bench_function("fixture_source", |b| {
        b.iter(|| CompiledGrammar::from_source(black_box(FIXTURE)).unwrap());
    });

    for &n in &[5, 20, 50] {
        group.bench_function(&format!("{n}_rules_builder"), |b| {
            b.iter(|| {
                let mut builder = GrammarBuilder::new();
                for i in 0..n {
                    let next = format!("r{}", i + 1);
                    builder = builder.rule(&format!("r{i}"), move |r| {
                        r.alt(|a| a.lit("(").slot_with("inner", &next, Modifier::Optional).lit(")"))
                    });
                }
                builder = builder.rule(&format!("r{n}"), |r| r.alt(|a| a.lit("leaf")));
                black_box(builder.compile().unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_render, bench_compilation);
criterion_main!(benches);
