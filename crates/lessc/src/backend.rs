//! The external LESS compiler.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The preprocessed buffer is compiled by an external program (the
//! node.js `lessc` by default) that reads LESS on stdin and writes CSS on
//! stdout. The invocation sits behind the [`Backend`] trait so that
//! everything up to the hand-off can be exercised without node installed.

use std::sync::Arc;

use lessc_runtime::{CommandOutput, NativeRuntime, SystemRuntime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::CompilerConfig;
use crate::error::LesscError;

/// Warning that old node releases print for every `lessc` run.
static BENIGN_WARNING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\(node:\d+\) DeprecationWarning: util\.print is deprecated\. Use console\.log instead\.",
    )
    .unwrap()
});

/// Compiles a preprocessed LESS buffer.
///
/// Implementations return the raw process output; [`interpret_output`]
/// decides whether it is a success.
pub trait Backend: Send + Sync {
    fn run(&self, input: &[u8]) -> Result<CommandOutput, LesscError>;
}

impl<F> Backend for F
where
    F: Fn(&[u8]) -> Result<CommandOutput, LesscError> + Send + Sync,
{
    fn run(&self, input: &[u8]) -> Result<CommandOutput, LesscError> {
        self(input)
    }
}

/// Runs the `lessc` executable through the [`SystemRuntime`].
///
/// The executable is taken from the configured environment variable
/// (`LESSC` by default) when set, otherwise from
/// [`CompilerConfig::executable`], looked up on `PATH`.
#[derive(Clone)]
pub struct LesscProcess {
    runtime: Arc<dyn SystemRuntime>,
    config: CompilerConfig,
}

impl std::fmt::Debug for LesscProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LesscProcess")
            .field("runtime", &"<SystemRuntime>")
            .field("config", &self.config)
            .finish()
    }
}

impl Default for LesscProcess {
    fn default() -> Self {
        Self::new(Arc::new(NativeRuntime::new()), CompilerConfig::default())
    }
}

impl LesscProcess {
    pub fn new(runtime: Arc<dyn SystemRuntime>, config: CompilerConfig) -> Self {
        Self { runtime, config }
    }

    /// The program that will be executed.
    pub fn executable(&self) -> String {
        if let Ok(Some(exe)) = self.runtime.env_get(&self.config.env_var) {
            if !exe.is_empty() {
                return exe;
            }
        }
        self.runtime
            .find_binary(&self.config.executable, &self.config.env_var)
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| self.config.executable.clone())
    }
}

impl Backend for LesscProcess {
    fn run(&self, input: &[u8]) -> Result<CommandOutput, LesscError> {
        let exe = self.executable();
        let args: Vec<&str> = self.config.args.iter().map(String::as_str).collect();
        tracing::debug!(command = %exe, ?args, bytes = input.len(), "running LESS compiler");
        Ok(self.runtime.exec_command(&exe, &args, Some(input))?)
    }
}

/// Turn compiler output into the compiled stylesheet or a [`LesscError::Compile`].
///
/// Lines of the known node deprecation warning are dropped from stderr;
/// anything left is a compile failure. The exit status alone does not fail
/// the compilation.
pub fn interpret_output(output: CommandOutput) -> Result<Vec<u8>, LesscError> {
    let stderr = output.stderr_string();
    let mut diagnostic = Vec::new();
    for line in stderr.lines() {
        if BENIGN_WARNING.is_match(line) {
            tracing::warn!(warning = line, "ignoring LESS compiler deprecation warning");
        } else {
            diagnostic.push(line);
        }
    }
    let diagnostic = diagnostic.join("\n");
    let diagnostic = diagnostic.trim();

    if !diagnostic.is_empty() {
        return Err(LesscError::Compile(diagnostic.to_string()));
    }
    if !output.success() {
        tracing::warn!(
            code = output.code,
            "LESS compiler exited unsuccessfully without a diagnostic"
        );
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessc_runtime::{PathKind, RuntimeError, RuntimeResult};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Runtime with a fixed environment that records executed commands.
    #[derive(Default)]
    struct RecordingRuntime {
        env: HashMap<String, String>,
        calls: Mutex<Vec<(String, Vec<String>, Vec<u8>)>>,
    }

    impl SystemRuntime for RecordingRuntime {
        fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
            Err(RuntimeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.display().to_string(),
            )))
        }

        fn path_exists(&self, _path: &Path, _kind: Option<PathKind>) -> RuntimeResult<bool> {
            Ok(false)
        }

        fn cwd(&self) -> RuntimeResult<PathBuf> {
            Ok(PathBuf::from("/"))
        }

        fn exec_command(
            &self,
            command: &str,
            args: &[&str],
            stdin: Option<&[u8]>,
        ) -> RuntimeResult<CommandOutput> {
            self.calls.lock().unwrap().push((
                command.to_string(),
                args.iter().map(|a| a.to_string()).collect(),
                stdin.unwrap_or_default().to_vec(),
            ));
            Ok(CommandOutput {
                code: 0,
                stdout: b".a{color:red}\n".to_vec(),
                stderr: Vec::new(),
            })
        }

        fn env_get(&self, name: &str) -> RuntimeResult<Option<String>> {
            Ok(self.env.get(name).cloned())
        }
    }

    fn output(code: i32, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            code,
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_runs_default_executable_with_stdin_flags() {
        let runtime = Arc::new(RecordingRuntime::default());
        let backend = LesscProcess::new(runtime.clone(), CompilerConfig::default());

        let out = backend.run(b".a { color: red; }").unwrap();
        assert_eq!(out.stdout, b".a{color:red}\n");

        let calls = runtime.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "lessc");
        assert_eq!(calls[0].1, vec!["-x", "-"]);
        assert_eq!(calls[0].2, b".a { color: red; }");
    }

    #[test]
    fn test_env_var_overrides_executable() {
        let runtime = Arc::new(RecordingRuntime {
            env: HashMap::from([("LESSC".to_string(), "/opt/bin/lessc".to_string())]),
            ..Default::default()
        });
        let backend = LesscProcess::new(runtime.clone(), CompilerConfig::default());
        assert_eq!(backend.executable(), "/opt/bin/lessc");

        backend.run(b"").unwrap();
        assert_eq!(runtime.calls.lock().unwrap()[0].0, "/opt/bin/lessc");
    }

    #[test]
    fn test_configured_executable_and_env_var() {
        let runtime = Arc::new(RecordingRuntime {
            env: HashMap::from([("MY_LESSC".to_string(), "custom-lessc".to_string())]),
            ..Default::default()
        });
        let config = CompilerConfig {
            executable: "node-lessc".to_string(),
            ..Default::default()
        };
        let backend = LesscProcess::new(runtime.clone(), config.clone());
        assert_eq!(backend.executable(), "node-lessc");

        let config = CompilerConfig {
            env_var: "MY_LESSC".to_string(),
            ..config
        };
        let backend = LesscProcess::new(runtime, config);
        assert_eq!(backend.executable(), "custom-lessc");
    }

    #[test]
    fn test_interpret_success() {
        let css = interpret_output(output(0, ".a{color:red}\n", "")).unwrap();
        assert_eq!(css, b".a{color:red}\n");
    }

    #[test]
    fn test_interpret_diagnostic_is_error() {
        let err = interpret_output(output(
            1,
            "",
            "ParseError: Unrecognised input in - on line 1, column 1:\n",
        ))
        .unwrap_err();
        match err {
            LesscError::Compile(msg) => assert!(msg.starts_with("ParseError")),
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_interpret_ignores_node_deprecation_warning() {
        let css = interpret_output(output(
            0,
            ".a{color:red}\n",
            "(node:12345) DeprecationWarning: util.print is deprecated. Use console.log instead.\n",
        ))
        .unwrap();
        assert_eq!(css, b".a{color:red}\n");
    }

    #[test]
    fn test_interpret_keeps_diagnostic_after_deprecation_warning() {
        let err = interpret_output(output(
            1,
            "",
            "(node:12345) DeprecationWarning: util.print is deprecated. Use console.log instead.\n\
             NameError: variable @missing is undefined in - on line 1, column 12:\n",
        ))
        .unwrap_err();
        match err {
            LesscError::Compile(msg) => {
                assert_eq!(
                    msg,
                    "NameError: variable @missing is undefined in - on line 1, column 12:"
                );
            }
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_interpret_nonzero_exit_without_stderr_returns_stdout() {
        let css = interpret_output(output(2, "partial", "")).unwrap();
        assert_eq!(css, b"partial");
    }

    #[test]
    fn test_closure_backend() {
        let backend = |input: &[u8]| -> Result<CommandOutput, LesscError> {
            Ok(CommandOutput {
                code: 0,
                stdout: input.to_ascii_uppercase(),
                stderr: Vec::new(),
            })
        };
        let out = Backend::run(&backend, b"abc").unwrap();
        assert_eq!(out.stdout, b"ABC");
    }
}
