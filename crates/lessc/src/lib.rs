//! LESS preprocessing and compilation for Quarto.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! This crate provides:
//! - Reference resolution across `file://`, named-package and network URIs
//! - `@import` inlining with once-only semantics and import options
//! - A shim around the external `lessc` compiler
//!
//! ```rust,ignore
//! let css = lessc::compile("@color: #000; .black { color: @color; }")?;
//! ```

mod assets;
mod backend;
mod compiler;
mod config;
mod error;
mod import;
mod loader;
mod uri;

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

pub use assets::{AssetProvider, AssetRegistry, NoAssets};
pub use backend::{Backend, LesscProcess, interpret_output};
pub use compiler::{Compiler, CompilerBuilder};
pub use config::{CompilerConfig, DEFAULT_ENV_VAR, DEFAULT_EXECUTABLE};
pub use error::{LesscError, LoadError};
pub use import::{ImportOptions, ImportState, Inliner, is_commented_out};
pub use loader::{DefaultLoader, Loader};
pub use uri::{DefaultResolver, Resolver, Uri, UriKind, is_asset_spec, resolve_uri};

// Runtime types appear in the public API (backends return CommandOutput)
pub use lessc_runtime::{CommandOutput, NativeRuntime, SystemRuntime};

static DEFAULT_COMPILER: Lazy<RwLock<Option<Arc<Compiler>>>> = Lazy::new(|| RwLock::new(None));

/// The process-wide compiler used by the free functions in this crate.
///
/// Created with default settings on first use.
pub fn default_compiler() -> Arc<Compiler> {
    if let Some(compiler) = DEFAULT_COMPILER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return compiler.clone();
    }
    DEFAULT_COMPILER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_insert_with(|| Arc::new(Compiler::new()))
        .clone()
}

/// Replace the process-wide compiler.
pub fn set_default_compiler(compiler: Compiler) {
    *DEFAULT_COMPILER
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(compiler));
}

/// The default compiler, or a new one when a resolver or loader is given.
pub fn get_compiler(
    resolver: Option<Arc<dyn Resolver>>,
    loader: Option<Arc<dyn Loader>>,
) -> Arc<Compiler> {
    if resolver.is_none() && loader.is_none() {
        return default_compiler();
    }
    let mut builder = Compiler::builder();
    if let Some(resolver) = resolver {
        builder = builder.shared_resolver(resolver);
    }
    if let Some(loader) = loader {
        builder = builder.shared_loader(loader);
    }
    Arc::new(builder.build())
}

/// Compile LESS source text with the default compiler.
pub fn compile(source: &str) -> Result<Vec<u8>, LesscError> {
    default_compiler().compile(source)
}

/// Compile a LESS file with the default compiler.
pub fn compile_file(path: impl AsRef<Path>) -> Result<Vec<u8>, LesscError> {
    default_compiler().compile_file(path)
}

/// Compile a named asset with the default compiler.
pub fn compile_asset(spec: &str) -> Result<Vec<u8>, LesscError> {
    default_compiler().compile_asset(spec)
}

/// Compile the source behind `uri` with the default compiler.
pub fn compile_uri(uri: &str) -> Result<Vec<u8>, LesscError> {
    default_compiler().compile_uri(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_compiler_without_overrides_is_default() {
        let a = get_compiler(None, None);
        let b = default_compiler();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_get_compiler_with_resolver_is_new() {
        let resolver: Arc<dyn Resolver> = Arc::new(|target: &str, _base: Option<&Uri>| {
            Uri::new(format!("file:///nonexistent-lessc-test/{}", target))
        });
        let custom = get_compiler(Some(resolver), None);
        assert!(!Arc::ptr_eq(&custom, &default_compiler()));
        assert_eq!(
            custom.preprocess("@import (optional) \"nope\";").unwrap(),
            ""
        );
    }
}
