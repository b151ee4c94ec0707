use std::sync::Arc;
use std::thread;

use tmpl::{RenderValue, compile};

fn main() {
    let grammar = Arc::new(
        compile("Greeting: \"Hello, \" <name:ident> \"!\";\n~~~\n")
            .expect("failed to compile grammar"),
    );

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let g = Arc::clone(&grammar);
            thread::spawn(move || {
                let input = RenderValue::record().set("name", format!("worker{i}"));
                let result = g.render("Greeting", &input);
                println!("Thread {i}: {result:?}");
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}
