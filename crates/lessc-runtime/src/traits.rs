/*
 * traits.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Defines the SystemRuntime trait and supporting types for the runtime abstraction layer.
 *
 * The LESS preprocessor touches the outside world in exactly three ways:
 * reading import targets, looking up the compiler override in the
 * environment, and piping the preprocessed buffer through the external
 * compiler. All three go through this trait so they can be faked in tests.
 */

use std::io;
use std::path::{Path, PathBuf};

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug)]
pub enum RuntimeError {
    /// Standard I/O error
    Io(io::Error),

    /// Operation not supported on this runtime (e.g., fetching URLs natively)
    NotSupported(String),

    /// Process could not be started or its pipes failed
    ProcessFailed {
        /// Program that was executed
        command: String,
        /// Error message
        message: String,
    },
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::Io(e) => write!(f, "I/O error: {}", e),
            RuntimeError::NotSupported(msg) => write!(f, "Operation not supported: {}", msg),
            RuntimeError::ProcessFailed { command, message } => {
                write!(f, "Process execution failed ({}): {}", command, message)
            }
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RuntimeError {
    fn from(e: io::Error) -> Self {
        RuntimeError::Io(e)
    }
}

impl RuntimeError {
    /// Whether this error means the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

/// Type of filesystem path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Regular file
    File,
    /// Directory
    Directory,
}

/// Output from a command execution
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (0 = success, -1 when terminated by a signal)
    pub code: i32,
    /// Standard output
    pub stdout: Vec<u8>,
    /// Standard error
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Check if the command succeeded (exit code 0)
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Get stderr as a string (lossy UTF-8 conversion)
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Trait defining the low-level operations the preprocessor needs.
///
/// Implementations provide the actual system interaction, allowing the
/// import inliner and compiler shim to run against the real filesystem
/// and process table, or against in-memory fakes in tests.
pub trait SystemRuntime: Send + Sync {
    // ═══════════════════════════════════════════════════════════════════════
    // FILE OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Read entire file contents as bytes.
    fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Check if path exists, optionally filtering by type.
    fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool>;

    /// Check if path exists and is a file.
    fn is_file(&self, path: &Path) -> RuntimeResult<bool> {
        self.path_exists(path, Some(PathKind::File))
    }

    /// Check if path exists and is a directory.
    fn is_dir(&self, path: &Path) -> RuntimeResult<bool> {
        self.path_exists(path, Some(PathKind::Directory))
    }

    /// Get current working directory.
    fn cwd(&self) -> RuntimeResult<PathBuf>;

    // ═══════════════════════════════════════════════════════════════════════
    // PROCESS EXECUTION
    // ═══════════════════════════════════════════════════════════════════════

    /// Execute command with full output capture.
    ///
    /// `stdin` is written to the child's standard input, which is then
    /// closed. Blocks until the process exits. A non-zero exit code is not
    /// an error at this level; callers inspect [`CommandOutput`].
    fn exec_command(
        &self,
        command: &str,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> RuntimeResult<CommandOutput>;

    // ═══════════════════════════════════════════════════════════════════════
    // ENVIRONMENT
    // ═══════════════════════════════════════════════════════════════════════

    /// Get single environment variable.
    fn env_get(&self, name: &str) -> RuntimeResult<Option<String>>;

    // ═══════════════════════════════════════════════════════════════════════
    // NETWORK
    // ═══════════════════════════════════════════════════════════════════════

    /// Fetch content from URL.
    ///
    /// Returns (content, mime_type).
    fn fetch_url(&self, url: &str) -> RuntimeResult<(Vec<u8>, String)> {
        Err(RuntimeError::NotSupported(format!(
            "fetching {} is not available on this runtime",
            url
        )))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // BINARY DISCOVERY
    // ═══════════════════════════════════════════════════════════════════════

    /// Find a binary by checking an environment variable first, then PATH.
    ///
    /// The `env_var` parameter names an environment variable that may
    /// contain the path to the binary (e.g., "LESSC" for lessc).
    ///
    /// Returns `None` if the binary is not found.
    ///
    /// Default implementation checks the environment variable but does not
    /// search PATH. Override in `NativeRuntime` to use `which::which()`.
    fn find_binary(&self, name: &str, env_var: &str) -> Option<PathBuf> {
        if let Ok(Some(path_str)) = self.env_get(env_var) {
            let path = PathBuf::from(path_str);
            if self.is_file(&path).unwrap_or(false) {
                return Some(path);
            }
        }
        let _ = name;
        None
    }
}
