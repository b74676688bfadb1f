//! `harbour-graph tree` command

use std::collections::HashSet;

use anyhow::Result;

use crate::cli::TreeArgs;
use crate::fixture::{load_graph, print_warnings};
use harbour_graph::graph::PackageGraph;
use harbour_graph::{ModulesGraph, PackageIdentity};

pub fn execute(args: TreeArgs, color: bool) -> Result<()> {
    let (graph, sink) = load_graph(&args.graph)?;
    print_warnings(&sink, color);

    let packages = graph.package_graph();
    let max_depth = args.depth.unwrap_or(usize::MAX);

    let mut seen = HashSet::new();
    for root in graph.input_packages() {
        print_tree(&graph, &packages, *root, 0, max_depth, &mut seen, args.modules);
    }

    Ok(())
}

fn print_tree(
    graph: &ModulesGraph,
    packages: &PackageGraph,
    identity: PackageIdentity,
    depth: usize,
    max_depth: usize,
    seen: &mut HashSet<PackageIdentity>,
    show_modules: bool,
) {
    if depth > max_depth {
        return;
    }

    let is_duplicate = !seen.insert(identity);

    let prefix = if depth == 0 {
        String::new()
    } else {
        format!("{}├── ", "│   ".repeat(depth - 1))
    };
    let dup_marker = if is_duplicate { " (*)" } else { "" };

    let label = match graph.package(identity) {
        Some(package) => package.location_description(),
        None => format!("'{}'", identity),
    };
    println!("{}{}{}", prefix, label, dup_marker);

    // Don't recurse into packages already shown
    if is_duplicate {
        return;
    }

    if show_modules {
        if let Some(package) = graph.package(identity) {
            let indent = "│   ".repeat(depth);
            for module in package.modules() {
                println!("{}│   {} ({})", indent, module.name(), module.kind());
            }
        }
    }

    for dependency in packages.dependencies(identity) {
        print_tree(graph, packages, dependency, depth + 1, max_depth, seen, show_modules);
    }
}
