//! Named asset packages.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! A reference such as `theme:res/base.less` names a package (`theme`) and
//! a path inside it (`res/base.less`). Packages are registered with an
//! [`AssetRegistry`] and backed either by a directory on disk or by a
//! directory tree embedded at compile time with `include_dir!`.
//!
//! ```ignore
//! use include_dir::{Dir, include_dir};
//! use lessc::AssetRegistry;
//!
//! static THEME: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/less");
//!
//! let mut assets = AssetRegistry::new();
//! assets.register_embedded("theme", &THEME);
//! assets.register_dir("site", "/srv/site/styles");
//! ```

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use include_dir::Dir;
use lessc_runtime::{NativeRuntime, SystemRuntime};

use crate::error::LoadError;

/// Looks up the content of `package:path` references.
pub trait AssetProvider: Send + Sync {
    fn load_asset(&self, package: &str, path: &str) -> Result<Vec<u8>, LoadError>;
}

/// Provider with no packages; every lookup is not-found.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

impl AssetProvider for NoAssets {
    fn load_asset(&self, package: &str, path: &str) -> Result<Vec<u8>, LoadError> {
        Err(LoadError::NotFound(format!("{}:{}", package, path)))
    }
}

#[derive(Clone)]
enum PackageSource {
    Directory(PathBuf),
    Embedded(&'static Dir<'static>),
}

/// Registry mapping package names to their content roots.
#[derive(Clone)]
pub struct AssetRegistry {
    packages: HashMap<String, PackageSource>,
    runtime: Arc<dyn SystemRuntime>,
}

impl std::fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.packages.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("AssetRegistry")
            .field("packages", &names)
            .field("runtime", &"<SystemRuntime>")
            .finish()
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetRegistry {
    /// Create an empty registry reading directories through the native runtime.
    pub fn new() -> Self {
        Self::with_runtime(Arc::new(NativeRuntime::new()))
    }

    pub fn with_runtime(runtime: Arc<dyn SystemRuntime>) -> Self {
        Self {
            packages: HashMap::new(),
            runtime,
        }
    }

    /// Serve `package:...` references from files under `root`.
    pub fn register_dir(&mut self, package: impl Into<String>, root: impl Into<PathBuf>) {
        self.packages
            .insert(package.into(), PackageSource::Directory(root.into()));
    }

    /// Serve `package:...` references from an embedded directory tree.
    pub fn register_embedded(&mut self, package: impl Into<String>, dir: &'static Dir<'static>) {
        self.packages
            .insert(package.into(), PackageSource::Embedded(dir));
    }

    pub fn contains(&self, package: &str) -> bool {
        self.packages.contains_key(package)
    }
}

impl AssetProvider for AssetRegistry {
    fn load_asset(&self, package: &str, path: &str) -> Result<Vec<u8>, LoadError> {
        let not_found = || LoadError::NotFound(format!("{}:{}", package, path));

        let source = self.packages.get(package).ok_or_else(not_found)?;
        let relative = package_relative(path).ok_or_else(not_found)?;

        match source {
            PackageSource::Directory(root) => {
                let full = root.join(&relative);
                self.runtime.file_read(&full).map_err(|e| {
                    if e.is_not_found() {
                        not_found()
                    } else {
                        LoadError::from(e)
                    }
                })
            }
            PackageSource::Embedded(dir) => dir
                .get_file(&relative)
                .map(|file| file.contents().to_vec())
                .ok_or_else(not_found),
        }
    }
}

/// Convert a package path into a relative filesystem path.
///
/// Returns `None` for paths that would leave the package root.
fn package_relative(path: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}
