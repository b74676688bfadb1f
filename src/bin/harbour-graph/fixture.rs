//! Graph files: the manifests a loading subsystem would hand over, in TOML.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use harbour_graph::core::{
    BinaryArtifactsMap, DefaultIdentityResolver, Manifest, PackageDependency, PrebuiltsMap,
    ProductFilter, TraitConfiguration,
};
use harbour_graph::graph::{GraphLoader, GraphOptions};
use harbour_graph::util::config::{global_config_path, load_config, project_config_path};
use harbour_graph::util::{CollectingSink, LocalFileSystem};
use harbour_graph::ModulesGraph;

use crate::cli::GraphArgs;

/// Contents of a graph file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GraphFile {
    pub manifests: Vec<Manifest>,
    pub root_dependencies: Vec<PackageDependency>,
    pub binary_artifacts: BinaryArtifactsMap,
    pub prebuilts: PrebuiltsMap,
    /// Location -> mirror location
    pub mirrors: BTreeMap<String, String>,
}

impl GraphFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read graph file: {}", path.display()))?;

        let file: GraphFile = toml::from_str(&contents)
            .with_context(|| format!("failed to parse graph file: {}", path.display()))?;

        if !file.manifests.iter().any(|m| m.is_root()) {
            bail!(
                "graph file {} declares no root package\n\
                 help: give at least one manifest `kind = {{ root = \"<path>\" }}`",
                path.display()
            );
        }
        Ok(file)
    }
}

/// Loader options from configuration, overridden by command-line flags.
fn options(args: &GraphArgs) -> GraphOptions {
    let project_root = args
        .file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let global = global_config_path().unwrap_or_default();
    let config = load_config(&global, &project_config_path(&project_root));

    let mut options = config.to_options();
    if args.all_traits {
        options = options.with_traits(TraitConfiguration::All);
    } else if !args.traits.is_empty() {
        options = options.with_traits(TraitConfiguration::explicit(args.traits.iter().cloned()));
    }
    if !args.product.is_empty() {
        options = options.with_product_filter(ProductFilter::specific(args.product.iter().cloned()));
    }
    options
}

/// Load the graph described by `args`.
///
/// Non-fatal diagnostics are returned alongside the graph.
pub fn load_graph(args: &GraphArgs) -> Result<(ModulesGraph, CollectingSink)> {
    let file = GraphFile::load(&args.file)?;

    let resolver = file
        .mirrors
        .iter()
        .fold(DefaultIdentityResolver::new(), |resolver, (original, mirror)| {
            resolver.with_mirror(original, mirror.clone())
        });
    let sink = CollectingSink::new();

    let graph = GraphLoader::new(&resolver, &LocalFileSystem, &sink)
        .with_options(options(args))
        .with_binary_artifacts(file.binary_artifacts)
        .with_prebuilts(file.prebuilts)
        .with_root_dependencies(file.root_dependencies)
        .load(&file.manifests)?;

    Ok((graph, sink))
}

/// Print collected warnings to stderr.
pub fn print_warnings(sink: &CollectingSink, color: bool) {
    for warning in sink.warnings() {
        eprint!("{}", warning.format(color));
    }
}
