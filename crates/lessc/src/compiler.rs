//! High-level compile API.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The compilation flow is:
//! 1. Obtain the top-level source (in-memory text, a file, a named asset or a URI)
//! 2. Inline its imports into a single buffer (done by [`Inliner`])
//! 3. Pipe the buffer through the external compiler (done by a [`Backend`])
//! 4. Interpret the compiler output (done by [`interpret_output`])
//!
//! # Example
//!
//! ```rust,ignore
//! use lessc::{AssetRegistry, Compiler};
//!
//! let mut assets = AssetRegistry::new();
//! assets.register_dir("site", "/srv/site/styles");
//!
//! let compiler = Compiler::builder().assets(assets).build();
//! let css = compiler.compile_asset("site:main.less")?;
//! ```

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use lessc_runtime::{NativeRuntime, SystemRuntime};

use crate::assets::{AssetProvider, NoAssets};
use crate::backend::{Backend, LesscProcess, interpret_output};
use crate::config::CompilerConfig;
use crate::error::LesscError;
use crate::import::{ImportState, Inliner, decode_source};
use crate::loader::{DefaultLoader, Loader};
use crate::uri::{DefaultResolver, Resolver, Uri, is_asset_spec, normalize_path};

/// LESS compiler: import inlining plus the external compiler hand-off.
///
/// A `Compiler` holds only long-lived collaborators; the set of imported
/// references is created fresh for every compile call, so one instance
/// can be shared freely.
#[derive(Clone)]
pub struct Compiler {
    base_uri: Option<Uri>,
    resolver: Arc<dyn Resolver>,
    loader: Arc<dyn Loader>,
    backend: Arc<dyn Backend>,
    runtime: Arc<dyn SystemRuntime>,
    config: CompilerConfig,
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("base_uri", &self.base_uri)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> CompilerBuilder {
        CompilerBuilder::default()
    }

    pub fn base_uri(&self) -> Option<&Uri> {
        self.base_uri.as_ref()
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile LESS source text.
    ///
    /// Relative imports are resolved against the current working directory.
    pub fn compile(&self, source: &str) -> Result<Vec<u8>, LesscError> {
        let preprocessed = self.preprocess(source)?;
        self.less2css(None, preprocessed)
    }

    /// Compile encoded LESS source.
    pub fn compile_bytes(&self, source: &[u8]) -> Result<Vec<u8>, LesscError> {
        let text = decode_input(source.to_vec())?;
        self.compile(&text)
    }

    /// Compile LESS source read to the end from `reader`.
    pub fn compile_reader<R: Read>(&self, mut reader: R) -> Result<Vec<u8>, LesscError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        self.compile_bytes(&buf)
    }

    /// Compile a LESS file; its imports resolve relative to the file.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, LesscError> {
        let (uri, preprocessed) = self.preprocess_file_inner(path.as_ref())?;
        self.less2css(Some(&uri), preprocessed)
    }

    /// Compile a named asset such as `theme:res/site.less`.
    pub fn compile_asset(&self, spec: &str) -> Result<Vec<u8>, LesscError> {
        let (uri, preprocessed) = self.preprocess_asset_inner(spec)?;
        self.less2css(Some(&uri), preprocessed)
    }

    /// Compile whatever `uri` refers to, resolved against the base URI.
    pub fn compile_uri(&self, uri: &str) -> Result<Vec<u8>, LesscError> {
        let (uri, preprocessed) = self.preprocess_uri_inner(uri)?;
        self.less2css(Some(&uri), preprocessed)
    }

    /// Inline the imports of `source` without compiling.
    pub fn preprocess(&self, source: &str) -> Result<String, LesscError> {
        self.inline(None, source)
    }

    pub fn preprocess_file(&self, path: impl AsRef<Path>) -> Result<String, LesscError> {
        self.preprocess_file_inner(path.as_ref()).map(|(_, text)| text)
    }

    pub fn preprocess_asset(&self, spec: &str) -> Result<String, LesscError> {
        self.preprocess_asset_inner(spec).map(|(_, text)| text)
    }

    pub fn preprocess_uri(&self, uri: &str) -> Result<String, LesscError> {
        self.preprocess_uri_inner(uri).map(|(_, text)| text)
    }

    fn preprocess_file_inner(&self, path: &Path) -> Result<(Uri, String), LesscError> {
        let absolute = if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.runtime.cwd()?.join(path))
        };
        let uri = Uri::from_file_path(&absolute);
        let bytes = self
            .runtime
            .file_read(&absolute)
            .map_err(|e| LesscError::Asset {
                uri: uri.clone(),
                source: e.into(),
            })?;
        let text = decode_loaded(&uri, bytes)?;
        let preprocessed = self.inline(Some(&uri), &text)?;
        Ok((uri, preprocessed))
    }

    fn preprocess_asset_inner(&self, spec: &str) -> Result<(Uri, String), LesscError> {
        if !is_asset_spec(spec) {
            return Err(LesscError::Unsupported(format!(
                "{:?} is not a named asset reference",
                spec
            )));
        }
        let uri = Uri::new(spec);
        let text = self.load_source(&uri)?;
        let preprocessed = self.inline(Some(&uri), &text)?;
        Ok((uri, preprocessed))
    }

    fn preprocess_uri_inner(&self, uri: &str) -> Result<(Uri, String), LesscError> {
        let uri = self.resolver.resolve(uri, self.base_uri.as_ref());
        let text = self.load_source(&uri)?;
        let preprocessed = self.inline(Some(&uri), &text)?;
        Ok((uri, preprocessed))
    }

    fn load_source(&self, uri: &Uri) -> Result<String, LesscError> {
        let bytes = self.loader.load(uri).map_err(|e| {
            if e.is_recoverable() {
                LesscError::Asset {
                    uri: uri.clone(),
                    source: e,
                }
            } else {
                LesscError::Unsupported(e.to_string())
            }
        })?;
        decode_loaded(uri, bytes)
    }

    fn inline(&self, uri: Option<&Uri>, source: &str) -> Result<String, LesscError> {
        let mut state = ImportState::new();
        let inliner = Inliner::new(self.resolver.as_ref(), self.loader.as_ref())
            .with_default_extension(&self.config.default_extension);
        let preprocessed = inliner.inline(uri, source, &mut state)?;
        tracing::debug!(
            uri = uri.map(Uri::as_str),
            imports = state.len(),
            "preprocessed LESS source"
        );
        Ok(preprocessed)
    }

    fn less2css(&self, uri: Option<&Uri>, preprocessed: String) -> Result<Vec<u8>, LesscError> {
        let output = self.backend.run(preprocessed.as_bytes())?;
        let css = interpret_output(output)?;
        tracing::debug!(uri = uri.map(Uri::as_str), bytes = css.len(), "compiled LESS");
        Ok(css)
    }
}

fn decode_input(bytes: Vec<u8>) -> Result<String, LesscError> {
    decode_source(bytes).map_err(|_| {
        LesscError::InvalidInput("binary input could not be converted to unicode".to_string())
    })
}

fn decode_loaded(uri: &Uri, bytes: Vec<u8>) -> Result<String, LesscError> {
    decode_source(bytes)
        .map_err(|_| LesscError::InvalidInput(format!("{} is not valid UTF-8 text", uri)))
}

/// Builder for [`Compiler`].
///
/// Unset collaborators default to the native runtime, no asset packages,
/// the standard resolution rules and the `lessc` executable.
#[derive(Default)]
pub struct CompilerBuilder {
    base_uri: Option<Uri>,
    resolver: Option<Arc<dyn Resolver>>,
    loader: Option<Arc<dyn Loader>>,
    backend: Option<Arc<dyn Backend>>,
    runtime: Option<Arc<dyn SystemRuntime>>,
    assets: Option<Arc<dyn AssetProvider>>,
    config: CompilerConfig,
}

impl CompilerBuilder {
    /// Base reference for [`Compiler::compile_uri`]. Overrides `config.base_uri`.
    pub fn base_uri(mut self, uri: impl Into<Uri>) -> Self {
        self.base_uri = Some(uri.into());
        self
    }

    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn shared_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replace the loader. Asset packages registered with
    /// [`assets`](Self::assets) are then only used by the default loader.
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn shared_loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn SystemRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn assets(mut self, assets: impl AssetProvider + 'static) -> Self {
        self.assets = Some(Arc::new(assets));
        self
    }

    pub fn config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Compiler {
        let runtime = self
            .runtime
            .unwrap_or_else(|| Arc::new(NativeRuntime::new()));
        let assets = self.assets.unwrap_or_else(|| Arc::new(NoAssets));
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(DefaultLoader::new(runtime.clone(), assets)));
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(DefaultResolver::new()));
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(LesscProcess::new(runtime.clone(), self.config.clone())));
        let base_uri = self
            .base_uri
            .or_else(|| self.config.base_uri.clone().map(Uri::new));

        Compiler {
            base_uri,
            resolver,
            loader,
            backend,
            runtime,
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use lessc_runtime::CommandOutput;

    /// Backend that returns its input unchanged.
    fn echo(input: &[u8]) -> Result<CommandOutput, LesscError> {
        Ok(CommandOutput {
            code: 0,
            stdout: input.to_vec(),
            stderr: Vec::new(),
        })
    }

    fn identity(target: &str, _base: Option<&Uri>) -> Uri {
        Uri::new(target)
    }

    fn red_loader(uri: &Uri) -> Result<Vec<u8>, LoadError> {
        match uri.as_str() {
            "red.less" | "red.css" => Ok(b".red { color: red; }".to_vec()),
            other => Err(LoadError::NotFound(other.to_string())),
        }
    }

    fn compiler() -> Compiler {
        Compiler::builder()
            .resolver(identity)
            .loader(red_loader)
            .backend(echo)
            .build()
    }

    #[test]
    fn test_compile_text_reaches_backend_unchanged() {
        let source = "@color: #000; .black { color: @color; }";
        let css = compiler().compile(source).unwrap();
        assert_eq!(css, source.as_bytes());
    }

    #[test]
    fn test_compile_inlines_once() {
        let css = compiler()
            .compile("@import \"red\";\n@import 'red';\n")
            .unwrap();
        assert_eq!(String::from_utf8(css).unwrap(), ".red { color: red; }\n\n");
    }

    #[test]
    fn test_state_is_fresh_per_call() {
        let compiler = compiler();
        let first = compiler.preprocess("@import \"red\";").unwrap();
        let second = compiler.preprocess("@import \"red\";").unwrap();
        assert_eq!(first, ".red { color: red; }");
        assert_eq!(second, first);
    }

    #[test]
    fn test_compile_bytes() {
        let css = compiler().compile_bytes(b"@import (less) \"red.css\";").unwrap();
        assert_eq!(css, b".red { color: red; }");

        let css = compiler().compile_bytes(b"\xEF\xBB\xBF.a{}").unwrap();
        assert_eq!(css, b".a{}");

        let err = compiler().compile_bytes(&[0xc3, 0x28]).unwrap_err();
        assert!(matches!(err, LesscError::InvalidInput(_)));
    }

    #[test]
    fn test_compile_reader() {
        let reader = std::io::Cursor::new(b".a { color: blue; }".to_vec());
        let css = compiler().compile_reader(reader).unwrap();
        assert_eq!(css, b".a { color: blue; }");
    }

    #[test]
    fn test_compile_error_from_backend() {
        let compiler = Compiler::builder()
            .backend(|_input: &[u8]| -> Result<CommandOutput, LesscError> {
                Ok(CommandOutput {
                    code: 1,
                    stdout: Vec::new(),
                    stderr: b"ParseError: Syntax Error on line 1".to_vec(),
                })
            })
            .build();
        let err = compiler.compile("this is not valid less.\n").unwrap_err();
        assert!(matches!(err, LesscError::Compile(ref m) if m.contains("Syntax Error")));
    }

    #[test]
    fn test_compile_asset_requires_asset_spec() {
        let err = compiler().compile_asset("/not/an/asset.less").unwrap_err();
        assert!(matches!(err, LesscError::Unsupported(_)));
    }

    #[test]
    fn test_compile_uri_uses_base() {
        let compiler = Compiler::builder()
            .base_uri("pkg:styles/main.less")
            .resolver(|target: &str, base: Option<&Uri>| -> Uri {
                assert_eq!(base.map(Uri::as_str), Some("pkg:styles/main.less"));
                Uri::new(target)
            })
            .loader(red_loader)
            .backend(echo)
            .build();
        let css = compiler.compile_uri("red.less").unwrap();
        assert_eq!(css, b".red { color: red; }");
    }

    #[test]
    fn test_compile_uri_missing_is_asset_error() {
        let err = compiler().compile_uri("blue.less").unwrap_err();
        assert!(matches!(err, LesscError::Asset { ref uri, .. } if uri.as_str() == "blue.less"));
    }

    #[test]
    fn test_base_uri_from_config() {
        let config = CompilerConfig {
            base_uri: Some("file:///srv/styles/".to_string()),
            ..Default::default()
        };
        let compiler = Compiler::builder().config(config).backend(echo).build();
        assert_eq!(
            compiler.base_uri().map(Uri::as_str),
            Some("file:///srv/styles/")
        );

        let compiler = Compiler::builder()
            .config(CompilerConfig {
                base_uri: Some("file:///ignored/".to_string()),
                ..Default::default()
            })
            .base_uri("file:///explicit/")
            .build();
        assert_eq!(compiler.base_uri().map(Uri::as_str), Some("file:///explicit/"));
    }

    #[test]
    fn test_compiler_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Compiler>();
    }
}
