//! Loading the content behind a resolved reference.
//!
//! Copyright (c) 2025 Posit, PBC

use std::sync::Arc;

use lessc_runtime::{NativeRuntime, SystemRuntime};

use crate::assets::{AssetProvider, NoAssets};
use crate::error::LoadError;
use crate::uri::{Uri, UriKind};

/// Fetches the raw bytes of a resolved reference.
pub trait Loader: Send + Sync {
    fn load(&self, uri: &Uri) -> Result<Vec<u8>, LoadError>;
}

impl<F> Loader for F
where
    F: Fn(&Uri) -> Result<Vec<u8>, LoadError> + Send + Sync,
{
    fn load(&self, uri: &Uri) -> Result<Vec<u8>, LoadError> {
        self(uri)
    }
}

/// Loader dispatching on the reference scheme.
///
/// - `file://` references are read through the [`SystemRuntime`]
/// - `package:path` references go to the [`AssetProvider`]
/// - other schemes are fetched through the runtime, which may report
///   them as unsupported
/// - scheme-less references are never loadable
#[derive(Clone)]
pub struct DefaultLoader {
    runtime: Arc<dyn SystemRuntime>,
    assets: Arc<dyn AssetProvider>,
}

impl std::fmt::Debug for DefaultLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultLoader")
            .field("runtime", &"<SystemRuntime>")
            .field("assets", &"<AssetProvider>")
            .finish()
    }
}

impl Default for DefaultLoader {
    fn default() -> Self {
        Self::new(Arc::new(NativeRuntime::new()), Arc::new(NoAssets))
    }
}

impl DefaultLoader {
    pub fn new(runtime: Arc<dyn SystemRuntime>, assets: Arc<dyn AssetProvider>) -> Self {
        Self { runtime, assets }
    }
}

impl Loader for DefaultLoader {
    fn load(&self, uri: &Uri) -> Result<Vec<u8>, LoadError> {
        match uri.kind() {
            UriKind::File { .. } => {
                let path = uri
                    .to_file_path()
                    .ok_or_else(|| LoadError::NotFound(uri.to_string()))?;
                Ok(self.runtime.file_read(&path)?)
            }
            UriKind::Asset { package, path } => self.assets.load_asset(package, path),
            UriKind::Network { .. } => {
                let (content, _mime) = self.runtime.fetch_url(uri.as_str())?;
                Ok(content)
            }
            UriKind::Relative => Err(LoadError::Unsupported(format!(
                "no asset loader for URI {:?}",
                uri.as_str()
            ))),
        }
    }
}
