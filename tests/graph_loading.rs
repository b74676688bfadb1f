//! Graph loading through the public API.
//!
//! These tests build manifests in memory and check the properties every
//! loaded graph must have.

use std::path::PathBuf;

use harbour_graph::core::{
    DefaultIdentityResolver, DependencyTrait, Manifest, ModuleDependencyDecl, ModuleDescription,
    ModuleId, ModuleKind, PackageDependency, PackageIdentity, PackageKind, ProductDescription,
    ProductKind, TraitConfiguration, TraitDescription,
};
use harbour_graph::graph::{
    topological_sort, GraphError, GraphLoader, GraphOptions, ModulesGraph, ModulesGraphError,
    PackageGraphError,
};
use harbour_graph::util::{CollectingSink, InMemoryFileSystem};

fn root(name: &str) -> Manifest {
    Manifest::new(name, PackageKind::Root(PathBuf::from(format!("/work/{}", name))))
}

fn package(name: &str) -> Manifest {
    Manifest::new(name, PackageKind::FileSystem(PathBuf::from(format!("/deps/{}", name))))
}

fn depends_on(name: &str) -> PackageDependency {
    PackageDependency::new(PackageKind::FileSystem(PathBuf::from(format!("/deps/{}", name))))
}

fn library(name: &str) -> Manifest {
    package(name)
        .with_module(ModuleDescription::new(name, ModuleKind::Library))
        .with_product(ProductDescription::new(name, ProductKind::Library, [name]))
}

fn load_with(manifests: &[Manifest], options: GraphOptions) -> (Result<ModulesGraph, ModulesGraphError>, CollectingSink) {
    let resolver = DefaultIdentityResolver::new();
    let fs = InMemoryFileSystem::new();
    let sink = CollectingSink::new();
    let result = GraphLoader::new(&resolver, &fs, &sink)
        .with_options(options)
        .load(manifests);
    (result, sink)
}

fn load(manifests: &[Manifest]) -> Result<ModulesGraph, ModulesGraphError> {
    load_with(manifests, GraphOptions::default()).0
}

fn package_error(result: Result<ModulesGraph, ModulesGraphError>) -> PackageGraphError {
    match result {
        Ok(_) => panic!("expected loading to fail"),
        Err(err) => err.package_error().cloned().unwrap(),
    }
}

fn id(name: &str) -> PackageIdentity {
    PackageIdentity::plain(name)
}

fn app_kit() -> Vec<Manifest> {
    vec![
        root("App")
            .with_dependency(depends_on("Kit"))
            .with_module(
                ModuleDescription::new("App", ModuleKind::Executable)
                    .with_dependency(ModuleDependencyDecl::product("Kit", Some("Kit"))),
            )
            .with_product(ProductDescription::new("App", ProductKind::Executable, ["App"])),
        package("Kit")
            .with_module(ModuleDescription::new("Kit", ModuleKind::Library))
            .with_module(
                ModuleDescription::new("KitTests", ModuleKind::Test)
                    .with_dependency(ModuleDependencyDecl::module("Kit")),
            )
            .with_product(ProductDescription::new("Kit", ProductKind::Library, ["Kit"]))
            .with_product(ProductDescription::new("KitTests", ProductKind::Test, ["KitTests"])),
    ]
}

#[test]
fn test_app_kit_end_to_end() {
    let (graph, sink) = load_with(&app_kit(), GraphOptions::default());
    let graph = graph.unwrap();

    let modules: Vec<&str> = graph.all_modules().iter().map(|m| m.name()).collect();
    assert!(modules.contains(&"App"));
    assert!(modules.contains(&"Kit"));
    assert!(!modules.contains(&"KitTests"));

    let reachable: Vec<&str> = graph.reachable_products().iter().map(|p| p.name()).collect();
    assert!(reachable.contains(&"App"));
    assert!(reachable.contains(&"Kit"));
    assert!(sink.is_empty());
}

#[test]
fn test_reachable_sets_are_subsets() {
    let graph = load(&app_kit()).unwrap();

    assert!(graph.reachable_modules().is_subset(graph.all_modules()));
    assert!(graph.reachable_products().is_subset(graph.all_products()));
}

#[test]
fn test_non_root_packages_contribute_no_tests() {
    let graph = load(&app_kit()).unwrap();

    for package in graph.packages().iter().filter(|p| !p.is_root()) {
        assert!(package.modules().iter().all(|m| m.kind() != ModuleKind::Test));
        assert!(package.products().iter().all(|p| p.kind() != ProductKind::Test));
    }
    assert!(graph.all_modules().iter().all(|m| m.kind() != ModuleKind::Test || graph.is_root_package(m.package())));
}

#[test]
fn test_sorter_detects_cycles() {
    let edges = |n: &PackageIdentity| match n.as_str() {
        "a" => vec![id("b")],
        "b" => vec![id("c")],
        "c" => vec![id("a")],
        _ => vec![],
    };
    assert_eq!(topological_sort([id("a")], edges), Err(GraphError::UnexpectedCycle));

    let acyclic = |n: &PackageIdentity| match n.as_str() {
        "a" => vec![id("b")],
        "b" => vec![id("c")],
        _ => vec![],
    };
    let sorted = topological_sort([id("a")], acyclic).unwrap();
    assert_eq!(sorted, vec![id("a"), id("b"), id("c")]);
}

fn traited(name: &str) -> Manifest {
    library(name)
        .with_trait(TraitDescription::new("Json"))
        .with_trait(TraitDescription::new("Tls"))
}

#[test]
fn test_traits_from_sibling_paths_are_unioned() {
    let via = |name: &str, trait_name: &str| {
        library(name).with_dependency(depends_on("Codec").with_traits(vec![DependencyTrait::new(trait_name)]))
    };
    let manifests = vec![
        root("App")
            .with_dependency(depends_on("Left"))
            .with_dependency(depends_on("Right"))
            .with_module(
                ModuleDescription::new("App", ModuleKind::Executable)
                    .with_dependency(ModuleDependencyDecl::product("Left", Some("Left")))
                    .with_dependency(ModuleDependencyDecl::product("Right", Some("Right"))),
            ),
        via("Left", "Json"),
        via("Right", "Tls"),
        traited("Codec"),
    ];

    let first = load(&manifests).unwrap();
    let traits = first.enabled_traits().get(id("codec"));
    assert!(traits.contains("Json"));
    assert!(traits.contains("Tls"));

    let second = load(&manifests).unwrap();
    assert_eq!(first.enabled_traits(), second.enabled_traits());
}

#[test]
fn test_all_traits_on_roots() {
    let manifests = vec![root("App")
        .with_trait(TraitDescription::new("Fast"))
        .with_trait(TraitDescription::new("Small"))
        .with_module(ModuleDescription::new("App", ModuleKind::Executable))];
    let options = GraphOptions::default().with_traits(TraitConfiguration::All);
    let (graph, _) = load_with(&manifests, options);

    assert_eq!(graph.unwrap().enabled_traits().get(id("app")).len(), 2);
}

#[test]
fn test_duplicate_utils_product() {
    let utils = |name: &str| {
        package(name)
            .with_module(ModuleDescription::new(name, ModuleKind::Library))
            .with_product(ProductDescription::new("Utils", ProductKind::Library, [name]))
    };
    let manifests = vec![
        root("App")
            .with_dependency(depends_on("One"))
            .with_dependency(depends_on("Two"))
            .with_module(ModuleDescription::new("App", ModuleKind::Executable)),
        utils("One"),
        utils("Two"),
    ];

    match package_error(load(&manifests)) {
        PackageGraphError::DuplicateProduct { product, packages } => {
            assert_eq!(product, "Utils");
            let names: Vec<&str> = packages.iter().map(|p| p.identity.as_str()).collect();
            assert_eq!(names, vec!["one", "two"]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_missing_foo_suggests_foo2() {
    let manifests = vec![
        root("App")
            .with_dependency(depends_on("Kit"))
            .with_module(
                ModuleDescription::new("App", ModuleKind::Executable)
                    .with_dependency(ModuleDependencyDecl::product("Foo", Some("Kit"))),
            ),
        package("Kit")
            .with_module(ModuleDescription::new("Kit", ModuleKind::Library))
            .with_product(ProductDescription::new("Foo2", ProductKind::Library, ["Kit"])),
    ];
    let err = package_error(load(&manifests));

    let message = err.to_string();
    assert!(message.starts_with("product 'Foo' required by package 'app' target 'App' not found"));
    assert!(message.ends_with("Did you mean 'Foo2'?"));
    assert!(!err.to_diagnostic().suggestions.is_empty());
}

#[test]
fn test_executable_maps_to_tests_through_libraries() {
    let manifests = vec![root("Tool")
        .with_module(
            ModuleDescription::new("Exec", ModuleKind::Executable)
                .with_dependency(ModuleDependencyDecl::module("Lib")),
        )
        .with_module(ModuleDescription::new("Lib", ModuleKind::Library))
        .with_module(
            ModuleDescription::new("ExecTests", ModuleKind::Test)
                .with_dependency(ModuleDependencyDecl::module("Lib")),
        )];
    let graph = load(&manifests).unwrap();

    let mapping = graph.compute_test_modules_for_executable_modules().unwrap();
    let exec = ModuleId::new(id("tool"), "Exec");
    let tests: Vec<&str> = mapping[&exec].iter().map(|m| m.name()).collect();
    assert_eq!(tests, vec!["ExecTests"]);
}

#[test]
fn test_errors_render_as_diagnostics() {
    let err = load(&[root("Empty")]).unwrap_err();

    assert_eq!(err.to_string(), "package 'empty' contains no products");
    let diagnostic = err.to_diagnostic();
    assert!(diagnostic.format(false).contains("package 'empty' contains no products"));
}
