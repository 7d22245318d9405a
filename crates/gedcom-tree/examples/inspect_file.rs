//! Simple decoder to inspect GEDCOM files.
//!
//! Usage: `cargo run --example inspect_file -- <path> [charset]`

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;

use gedcom_tree::codec::OPTION_CHARSET;
use gedcom_tree::{NodeKind, Parent, Tree, check_tree};
use tracing_subscriber::EnvFilter;

fn preview(value: &str) -> String {
    let first = value.lines().next().unwrap_or_default();
    let shown: String = first.chars().take(60).collect();
    if shown.len() < value.len() {
        format!("\"{}...\"", shown)
    } else {
        format!("\"{}\"", shown)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().expect("usage: inspect_file <path> [charset]");

    let mut tree = Tree::new();
    if let Some(charset) = args.next() {
        tree.options_mut().insert(OPTION_CHARSET.to_string(), charset);
    }

    println!("Reading: {}", path);
    let file = File::open(&path).expect("Failed to open file");
    let report = match tree.read(BufReader::new(file)) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Decode failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("\n=== Header ===");
    println!("Format: {:?}", report.format);
    println!("Version: {}", tree.version().unwrap_or("(none)"));
    println!("Major version: {}", report.version);
    println!("Charset: {}", report.charset);

    println!("\n=== Records ({}) ===", report.records);
    let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
    for root in tree.roots().iter() {
        let Some(node) = tree.node(root) else { continue };
        let label = match node.kind() {
            NodeKind::Generic => node.tag().to_string(),
            kind => format!("{:?}", kind),
        };
        *by_kind.entry(label).or_default() += 1;
    }
    for (kind, count) in &by_kind {
        println!("  {}: {}", kind, count);
    }
    println!("Nodes: {}", tree.descendants(Parent::Root).count());
    println!("Identifiers: {}", tree.identifier_count());

    let empty_families = tree
        .roots()
        .iter()
        .filter(|&r| tree.is_empty_family(r))
        .count();
    if empty_families > 0 {
        println!("Empty families (skipped on write): {}", empty_families);
    }

    println!("\n=== First 10 Records (detail) ===");
    for (i, root) in tree.roots().iter().take(10).enumerate() {
        let Some(node) = tree.node(root) else { continue };
        let id = node.identifier().map(|s| format!("@{}@ ", s)).unwrap_or_default();
        match node.value() {
            Some(v) if !v.is_empty() => println!("[{}] {}{} {}", i, id, node.tag(), preview(v)),
            _ => println!("[{}] {}{}", i, id, node.tag()),
        }
        for child in tree.children(root).iter().take(5) {
            let Some(c) = tree.node(child) else { continue };
            if let Some(target) = c.reference() {
                let resolved = if tree.dereference(child).is_some() { "" } else { " (unresolved)" };
                println!("      {} -> @{}@{}", c.tag(), target, resolved);
            } else if let Some(v) = c.value().filter(|v| !v.is_empty()) {
                println!("      {} = {}", c.tag(), preview(v));
            } else {
                println!("      {}", c.tag());
            }
        }
        if node.children().len() > 5 {
            println!("      ... and {} more", node.children().len() - 5);
        }
    }

    if !report.warnings.is_empty() {
        println!("\n=== Warnings ({}) ===", report.warnings.len());
        for w in &report.warnings {
            println!("  {}", w);
        }
    }

    if let Err(e) = check_tree(&tree) {
        println!("\nInvariant violation: {}", e);
    }
}
