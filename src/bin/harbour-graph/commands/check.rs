//! `harbour-graph check` command

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::json;

use crate::cli::CheckArgs;
use crate::fixture::{load_graph, print_warnings};
use harbour_graph::ModulesGraph;

pub fn execute(args: CheckArgs, color: bool) -> Result<()> {
    let (graph, sink) = load_graph(&args.graph)?;

    if args.json {
        let warnings: Vec<String> = sink.warnings().into_iter().map(|w| w.message).collect();
        let mut summary = summary(&graph);
        summary["warnings"] = json!(warnings);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_warnings(&sink, color);

    let roots: Vec<String> = graph.root_packages().iter().map(|p| p.identity().to_string()).collect();
    println!("Loaded package graph for {}", roots.join(", "));
    println!(
        "  packages: {} ({} root)",
        graph.packages().len(),
        graph.root_packages().len()
    );
    println!(
        "  modules:  {} ({} reachable)",
        graph.all_modules().len(),
        graph.reachable_modules().len()
    );
    println!(
        "  products: {} ({} reachable)",
        graph.all_products().len(),
        graph.reachable_products().len()
    );

    if !graph.required_dependencies().is_empty() {
        println!();
        println!("Required dependencies:");
        for dependency in graph.required_dependencies() {
            let loaded = if graph.package(dependency.identity).is_some() {
                ""
            } else {
                " (not loaded)"
            };
            println!("  {}{}", dependency, loaded);
        }
    }

    let traits: Vec<String> = graph
        .enabled_traits()
        .iter()
        .filter(|(_, traits)| !traits.is_empty())
        .map(|(package, traits)| {
            let traits: Vec<&str> = traits.iter().map(String::as_str).collect();
            format!("  {}: {}", package, traits.join(", "))
        })
        .collect();
    if !traits.is_empty() {
        println!();
        println!("Enabled traits:");
        for line in traits {
            println!("{}", line);
        }
    }

    Ok(())
}

fn summary(graph: &ModulesGraph) -> serde_json::Value {
    let names = |ids: Vec<String>| {
        let mut ids = ids;
        ids.sort();
        ids
    };
    let enabled_traits: BTreeMap<String, Vec<String>> = graph
        .enabled_traits()
        .iter()
        .map(|(package, traits)| (package.to_string(), traits.iter().cloned().collect()))
        .collect();

    json!({
        "root-packages": names(graph.root_packages().iter().map(|p| p.identity().to_string()).collect()),
        "packages": names(graph.packages().iter().map(|p| p.identity().to_string()).collect()),
        "modules": names(graph.all_modules().iter().map(|m| m.id().to_string()).collect()),
        "reachable-modules": names(graph.reachable_modules().iter().map(|m| m.id().to_string()).collect()),
        "products": names(graph.all_products().iter().map(|p| p.id().to_string()).collect()),
        "reachable-products": names(graph.reachable_products().iter().map(|p| p.id().to_string()).collect()),
        "required-dependencies": graph
            .required_dependencies()
            .iter()
            .map(|r| json!({ "identity": r.identity, "location": r.kind.location() }))
            .collect::<Vec<_>>(),
        "enabled-traits": enabled_traits,
    })
}
