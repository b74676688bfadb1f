//! `harbour-graph tests` command
//!
//! Shows which root test modules exercise each root executable.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::cli::TestsArgs;
use crate::fixture::{load_graph, print_warnings};

pub fn execute(args: TestsArgs, color: bool) -> Result<()> {
    let (graph, sink) = load_graph(&args.graph)?;
    let mapping = graph.compute_test_modules_for_executable_modules()?;

    let mapping: BTreeMap<String, Vec<String>> = mapping
        .into_iter()
        .map(|(executable, tests)| {
            let tests = tests.iter().map(|t| t.name().to_string()).collect();
            (executable.name, tests)
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&mapping)?);
        return Ok(());
    }

    print_warnings(&sink, color);

    if mapping.is_empty() {
        println!("No executable modules in the root packages");
        return Ok(());
    }

    for (executable, tests) in &mapping {
        if tests.is_empty() {
            println!("{}: (no tests)", executable);
        } else {
            println!("{}: {}", executable, tests.join(", "));
        }
    }

    Ok(())
}
