//! Manifest fixtures for common graph scenarios.

use std::path::PathBuf;

use crate::core::identity::PackageKind;
use crate::core::manifest::{
    Manifest, ModuleDependencyDecl, ModuleDescription, PackageDependency, ProductDescription,
};
use crate::core::module::ModuleKind;
use crate::core::product::ProductKind;

/// A root package checked out under `/work/<name>`.
pub fn root(name: &str) -> Manifest {
    Manifest::new(name, PackageKind::Root(PathBuf::from(format!("/work/{}", name))))
}

/// A local dependency package under `/deps/<name>`.
pub fn package(name: &str) -> Manifest {
    Manifest::new(name, PackageKind::FileSystem(dependency_path(name)))
}

/// A declared dependency on [`package`]`(name)`.
pub fn depends_on(name: &str) -> PackageDependency {
    PackageDependency::new(PackageKind::FileSystem(dependency_path(name)))
}

pub fn module(name: &str, kind: ModuleKind) -> ModuleDescription {
    ModuleDescription::new(name, kind)
}

/// A package vending one library product made of one module.
pub fn library_package(name: &str) -> Manifest {
    package(name)
        .with_module(module(name, ModuleKind::Library))
        .with_product(ProductDescription::new(name, ProductKind::Library, [name]))
}

/// Root `App` depending on product `Kit`; `Kit` also declares tests.
pub fn app_kit() -> Vec<Manifest> {
    vec![
        root("App")
            .with_dependency(depends_on("Kit"))
            .with_module(
                module("App", ModuleKind::Executable)
                    .with_dependency(ModuleDependencyDecl::product("Kit", Some("Kit"))),
            )
            .with_product(ProductDescription::new("App", ProductKind::Executable, ["App"])),
        package("Kit")
            .with_module(module("Kit", ModuleKind::Library))
            .with_module(
                module("KitTests", ModuleKind::Test)
                    .with_dependency(ModuleDependencyDecl::module("Kit")),
            )
            .with_product(ProductDescription::new("Kit", ProductKind::Library, ["Kit"]))
            .with_product(ProductDescription::new("KitTests", ProductKind::Test, ["KitTests"])),
    ]
}

fn dependency_path(name: &str) -> PathBuf {
    PathBuf::from(format!("/deps/{}", name))
}
