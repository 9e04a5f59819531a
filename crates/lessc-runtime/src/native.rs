/*
 * native.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * NativeRuntime implementation with full system access via std.
 */

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::traits::{CommandOutput, PathKind, RuntimeError, RuntimeResult, SystemRuntime};

/// Runtime backed directly by the host operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl SystemRuntime for NativeRuntime {
    fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }

    fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        Ok(match kind {
            None => true,
            Some(PathKind::File) => metadata.is_file(),
            Some(PathKind::Directory) => metadata.is_dir(),
        })
    }

    fn cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(std::env::current_dir()?)
    }

    fn exec_command(
        &self,
        command: &str,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> RuntimeResult<CommandOutput> {
        let process_failed = |e: std::io::Error| RuntimeError::ProcessFailed {
            command: command.to_string(),
            message: e.to_string(),
        };

        let mut child = Command::new(command)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(process_failed)?;

        // The writer runs on its own thread so a child that fills its
        // stdout pipe before draining stdin cannot deadlock us.
        let writer = match (stdin, child.stdin.take()) {
            (Some(data), Some(mut pipe)) => {
                let data = data.to_vec();
                Some(std::thread::spawn(move || pipe.write_all(&data)))
            }
            _ => None,
        };

        let output = child.wait_with_output().map_err(process_failed)?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                // The child may legitimately exit without reading everything.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(process_failed(e)),
                Err(_) => {
                    return Err(RuntimeError::ProcessFailed {
                        command: command.to_string(),
                        message: "stdin writer thread panicked".to_string(),
                    });
                }
            }
        }

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn env_get(&self, name: &str) -> RuntimeResult<Option<String>> {
        match std::env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(RuntimeError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("environment variable {} is not valid unicode", name),
            ))),
        }
    }

    fn find_binary(&self, name: &str, env_var: &str) -> Option<PathBuf> {
        if let Ok(Some(path_str)) = self.env_get(env_var) {
            let path = PathBuf::from(path_str);
            if self.is_file(&path).unwrap_or(false) {
                return Some(path);
            }
        }
        which::which(name).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_read_and_exists() {
        let rt = NativeRuntime::new();
        let temp = tempfile::tempdir().unwrap();
        let file_path = temp.path().join("base.less");
        std::fs::write(&file_path, b"@color: #000;").unwrap();

        assert!(rt.path_exists(&file_path, None).unwrap());
        assert!(rt.is_file(&file_path).unwrap());
        assert!(!rt.is_dir(&file_path).unwrap());
        assert!(rt.is_dir(temp.path()).unwrap());
        assert_eq!(rt.file_read(&file_path).unwrap(), b"@color: #000;");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let rt = NativeRuntime::new();
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("missing.less");

        assert!(!rt.path_exists(&missing, None).unwrap());
        let err = rt.file_read(&missing).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_cwd_is_absolute() {
        let rt = NativeRuntime::new();
        assert!(rt.cwd().unwrap().is_absolute());
    }

    #[test]
    fn test_fetch_url_not_supported() {
        let rt = NativeRuntime::new();
        let err = rt.fetch_url("http://example.com/a.less").unwrap_err();
        assert!(matches!(err, RuntimeError::NotSupported(_)));
    }

    #[test]
    fn test_exec_missing_program() {
        let rt = NativeRuntime::new();
        let err = rt
            .exec_command("definitely-not-a-real-lessc-binary", &["-x", "-"], Some(b""))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ProcessFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_pipes_stdin_to_stdout() {
        let rt = NativeRuntime::new();
        let output = rt
            .exec_command("cat", &[], Some(b".a { color: red; }"))
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, b".a { color: red; }");
        assert!(output.stderr.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_captures_stderr_and_code() {
        let rt = NativeRuntime::new();
        let output = rt
            .exec_command("sh", &["-c", "echo oops >&2; exit 3"], None)
            .unwrap();
        assert_eq!(output.code, 3);
        assert_eq!(output.stderr_string().trim(), "oops");
    }
}
