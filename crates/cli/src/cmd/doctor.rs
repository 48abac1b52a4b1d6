use mdpress_core::config::loader::{ConfigLoader, default_config_path};
use std::path::Path;

pub fn run(config: Option<&Path>) -> i32 {
    let rc = match ConfigLoader::load(config) {
        Ok(rc) => rc,
        Err(e) => {
            println!("FAIL mdpress doctor");
            println!("{e}");
            if config.is_none() {
                println!("looked for: {}", default_config_path().display());
            }
            return 1;
        }
    };

    println!("OK   mdpress doctor");
    println!("{}", mdpress_core::doctor_banner());
    println!("path: {}", rc.source.display());
    println!("vault_root: {}", rc.vault_root.display());
    println!("output_dir: {}", rc.output_dir.display());
    println!("mode: {:?}", rc.mode);
    if let Some(file) = &rc.markdown_file {
        println!("markdown_file: {}", file.display());
    }
    println!("excluded: {}", rc.excluded.join(", "));
    match rc.concurrency {
        Some(n) => println!("concurrency: {n}"),
        None => println!("concurrency: auto"),
    }
    println!("enable_simple_merge: {}", rc.enable_simple_merge);
    println!("resolver.max_depth: {}", rc.resolver.max_depth);
    println!("processors.pre:  {}", rc.processors.pre.join(", "));
    println!("processors.post: {}", rc.processors.post.join(", "));
    println!("engine: {} x{}", rc.engine.program, rc.engine.passes);
    if let Some(converter) = &rc.svg_converter {
        println!("svg_converter: {}", converter.join(" "));
    }
    match &rc.book {
        Some(book) => println!("book: '{}' ({} parts)", book.title, book.parts.len()),
        None => println!("book: disabled"),
    }

    if !rc.vault_root.is_dir() {
        println!("WARN vault_root does not exist");
        return 1;
    }
    0
}
