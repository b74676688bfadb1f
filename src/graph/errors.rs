//! Package graph errors and their diagnostics.

use crate::core::identity::{PackageIdentity, PackageReference};
use crate::core::package::describe_location;
use crate::core::traits::TraitError;
use crate::graph::topo::GraphError;
use crate::util::diagnostic::Diagnostic;

/// Help attached to an unresolved product dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductSuggestion {
    /// A product with exactly this name exists in another package.
    Qualified { product: String, package: String },
    /// A product with a similar name exists.
    SimilarName(String),
}

/// A structural problem with the package graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackageGraphError {
    /// A root package with no products and no modules.
    #[error("{}", self.describe())]
    NoModules { package: String },

    /// Module dependency cycle.
    #[error("{}", self.describe())]
    CycleDetected { path: Vec<String>, cycle: Vec<String> },

    /// Package dependency cycle in a package graph that predates cycle
    /// support.
    #[error("{}", self.describe())]
    DependencyCycleDetected { path: Vec<String>, cycle: Vec<String> },

    #[error("{}", self.describe())]
    ProductDependencyNotFound {
        package: String,
        module: String,
        product: String,
        dependency_package: Option<String>,
        in_same_package: bool,
        suggestion: Option<ProductSuggestion>,
    },

    #[error("{}", self.describe())]
    DuplicateProduct {
        product: String,
        packages: Vec<PackageReference>,
    },

    #[error("{}", self.describe())]
    MultipleModuleAliases {
        module: String,
        product: String,
        package: String,
        aliases: Vec<String>,
    },

    /// Two declarations reach the same identity from different locations.
    #[error("{}", self.describe())]
    IdentityConflict {
        package: String,
        location: String,
        other_location: String,
        identity: PackageIdentity,
        /// Dependency chains from a root to each declaration.
        chains: Option<(Vec<String>, Vec<String>)>,
    },

    /// Two declarations share an explicit name but not a location.
    #[error("{}", self.describe())]
    NameConflict {
        package: String,
        location: String,
        other_location: String,
        name: String,
    },

    #[error("{}", self.describe())]
    ProductDependencyMissingPackage {
        product: String,
        module: String,
        candidates: Vec<String>,
    },

    #[error("{}", self.describe())]
    UnsupportedPluginDependency {
        plugin: String,
        dependency: String,
        dependency_kind: String,
        package: Option<String>,
    },

    #[error("{}", self.describe())]
    UnknownModuleDependency {
        module: String,
        dependency: String,
        valid: Vec<String>,
    },

    #[error("{}", self.describe())]
    InvalidTrait {
        package: String,
        trait_name: String,
        available: Vec<String>,
    },

    #[error("{}", self.describe())]
    TraitsNotSupported { package: String },
}

fn quoted(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("'{}'", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn closed_cycle(path: &[String], cycle: &[String]) -> String {
    let mut nodes: Vec<&str> = path.iter().chain(cycle.iter()).map(String::as_str).collect();
    if let Some(first) = cycle.first() {
        nodes.push(first);
    }
    nodes.join(" -> ")
}

impl PackageGraphError {
    /// The normative rendering of this error.
    pub fn describe(&self) -> String {
        match self {
            PackageGraphError::NoModules { package } => {
                format!("package '{}' contains no products", package)
            }

            PackageGraphError::CycleDetected { path, cycle } => {
                format!(
                    "cyclic dependency declaration found: {}",
                    closed_cycle(path, cycle)
                )
            }

            PackageGraphError::DependencyCycleDetected { path, cycle } => {
                format!(
                    "cyclic dependency between packages {} requires tools-version 6.0 or later",
                    closed_cycle(path, cycle)
                )
            }

            PackageGraphError::ProductDependencyNotFound {
                package,
                module,
                product,
                dependency_package,
                in_same_package,
                suggestion,
            } => {
                if *in_same_package {
                    return format!(
                        "product '{}' is declared in the same package '{}' and can't be used as a dependency for target '{}'.",
                        product, package, module
                    );
                }
                let mut message = format!(
                    "product '{}' required by package '{}' target '{}' not found",
                    product, package, module
                );
                if let Some(dependency_package) = dependency_package {
                    message.push_str(&format!(" in package '{}'", dependency_package));
                }
                message.push('.');
                match suggestion {
                    Some(ProductSuggestion::Qualified { product, package }) => {
                        message.push_str(&format!(
                            " Did you mean '.product(name: \"{}\", package: \"{}\")'?",
                            product, package
                        ));
                    }
                    Some(ProductSuggestion::SimilarName(name)) => {
                        message.push_str(&format!(" Did you mean '{}'?", name));
                    }
                    None => {}
                }
                message
            }

            PackageGraphError::DuplicateProduct { product, packages } => {
                let packages: Vec<String> = packages
                    .iter()
                    .map(|p| describe_location(p.identity, &p.kind))
                    .collect();
                format!(
                    "multiple packages ({}) declare products with a conflicting name: '{}'; product names need to be unique across the package graph",
                    packages.join(", "),
                    product
                )
            }

            PackageGraphError::MultipleModuleAliases {
                module,
                product,
                package,
                aliases,
            } => {
                format!(
                    "multiple aliases: [{}] found for target '{}' in product '{}' from package '{}'",
                    quoted(aliases),
                    module,
                    product,
                    package
                )
            }

            PackageGraphError::IdentityConflict {
                package,
                location,
                other_location,
                identity,
                chains,
            } => {
                let mut message = format!(
                    "'{}' dependency on '{}' conflicts with dependency on '{}' which has the same identity '{}'",
                    package, location, other_location, identity
                );
                if let Some((first, second)) = chains {
                    message.push_str(&format!(
                        ". The dependencies are introduced through the following chains: (A) {} (B) {}",
                        first.join(" -> "),
                        second.join(" -> ")
                    ));
                }
                message
            }

            PackageGraphError::NameConflict {
                package,
                location,
                other_location,
                name,
            } => {
                format!(
                    "'{}' dependency on '{}' conflicts with dependency on '{}' which has the same explicit name '{}'",
                    package, location, other_location, name
                )
            }

            PackageGraphError::ProductDependencyMissingPackage { product, module, .. } => {
                format!(
                    "dependency '{}' in target '{}' requires explicit declaration; reference the package in the target dependency with '.product(name: \"{}\", package: <package>)'",
                    product, module, product
                )
            }

            PackageGraphError::UnsupportedPluginDependency {
                plugin,
                dependency,
                dependency_kind,
                package,
            } => {
                let from = package
                    .as_ref()
                    .map(|p| format!(" from package '{}'", p))
                    .unwrap_or_default();
                format!(
                    "plugin '{}' cannot depend on '{}' of type '{}'{}; this dependency is unsupported",
                    plugin, dependency, dependency_kind, from
                )
            }

            PackageGraphError::UnknownModuleDependency {
                module,
                dependency,
                valid,
            } => {
                format!(
                    "unknown dependency '{}' in target '{}'; valid dependencies are: {}",
                    dependency,
                    module,
                    quoted(valid)
                )
            }

            PackageGraphError::InvalidTrait {
                package,
                trait_name,
                available,
            } => TraitError::InvalidTrait {
                package: package.clone(),
                trait_name: trait_name.clone(),
                available: available.clone(),
            }
            .to_string(),

            PackageGraphError::TraitsNotSupported { package } => {
                TraitError::TraitsNotSupported {
                    package: package.clone(),
                }
                .to_string()
            }
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.describe());
        match self {
            PackageGraphError::CycleDetected { .. } => diag.with_suggestion(
                "Break the cycle by removing or restructuring target dependencies",
            ),

            PackageGraphError::DependencyCycleDetected { .. } => diag
                .with_suggestion("Raise the tools version of every package on the cycle to 6.0")
                .with_suggestion("Break the cycle by removing or restructuring dependencies"),

            PackageGraphError::DuplicateProduct { packages, .. } => packages
                .iter()
                .fold(diag, |d, p| d.with_context(format!("declared by {}", p)))
                .with_suggestion("Rename one of the products, or use module aliases"),

            PackageGraphError::ProductDependencyNotFound { package, .. } => diag
                .with_package(package.clone())
                .with_suggestion("Check that the product name is spelled correctly"),

            PackageGraphError::ProductDependencyMissingPackage {
                product,
                candidates,
                ..
            } => candidates.iter().fold(diag, |d, c| {
                d.with_suggestion(format!(".product(name: \"{}\", package: \"{}\")", product, c))
            }),

            PackageGraphError::IdentityConflict { .. } | PackageGraphError::NameConflict { .. } => {
                diag.with_suggestion("Point every dependency on this package at the same location")
            }

            PackageGraphError::InvalidTrait { package, .. }
            | PackageGraphError::TraitsNotSupported { package } => diag.with_package(package.clone()),

            PackageGraphError::UnknownModuleDependency { valid, .. } if !valid.is_empty() => {
                diag.with_suggestion(format!("Use one of: {}", valid.join(", ")))
            }

            _ => diag,
        }
    }
}

impl From<TraitError> for PackageGraphError {
    fn from(err: TraitError) -> Self {
        match err {
            TraitError::InvalidTrait {
                package,
                trait_name,
                available,
            } => PackageGraphError::InvalidTrait {
                package,
                trait_name,
                available,
            },
            TraitError::TraitsNotSupported { package } => {
                PackageGraphError::TraitsNotSupported { package }
            }
        }
    }
}

/// Everything graph construction can fail with.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ModulesGraphError {
    #[error(transparent)]
    #[diagnostic(code(harbour::graph::cycle))]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(code(harbour::graph::package))]
    Package(#[from] PackageGraphError),
}

impl ModulesGraphError {
    /// The package graph error, if that is what this is.
    pub fn package_error(&self) -> Option<&PackageGraphError> {
        match self {
            ModulesGraphError::Package(err) => Some(err),
            ModulesGraphError::Graph(_) => None,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ModulesGraphError::Package(err) => err.to_diagnostic(),
            ModulesGraphError::Graph(err) => Diagnostic::error(err.to_string()),
        }
    }
}

impl From<TraitError> for ModulesGraphError {
    fn from(err: TraitError) -> Self {
        ModulesGraphError::Package(err.into())
    }
}
