//! Privileged subprocess execution.
//!
//! Direct port of `utils/system.py::execute_command`: prepend `sudo` only
//! when elevation was requested and we aren't already root, capture output,
//! and turn both a missing binary and a non-zero exit into the same closed
//! error variant.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tpt_schema::Error;

/// The outcome of a successful command invocation.
#[derive(Debug, Clone)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

/// One external-tool invocation, built with the same fluent-builder shape
/// the rest of the workspace favors for multi-optional-field calls.
#[derive(Debug, Clone)]
pub struct SystemCommand {
    argv: Vec<String>,
    as_root: bool,
    cwd: Option<PathBuf>,
    env: HashMap<String, String>,
    stdin: Option<String>,
}

impl SystemCommand {
    pub fn new(argv: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            as_root: false,
            cwd: None,
            env: HashMap::new(),
            stdin: None,
        }
    }

    #[must_use]
    pub fn as_root(mut self, as_root: bool) -> Self {
        self.as_root = as_root;
        self
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    fn effective_argv(&self) -> Vec<String> {
        if self.as_root && !running_as_root() {
            let mut argv = Vec::with_capacity(self.argv.len() + 1);
            argv.push("sudo".to_string());
            argv.extend(self.argv.iter().cloned());
            argv
        } else {
            self.argv.clone()
        }
    }

    /// Run the command, returning captured stdout/stderr.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDependency`] if the binary isn't on `PATH`,
    /// or [`Error::SystemCommand`] if it exits non-zero.
    pub async fn run(&self) -> Result<Output, Error> {
        let argv = self.effective_argv();
        let program = argv.first().cloned().unwrap_or_default();
        tracing::debug!(command = %argv.join(" "), "executing command");

        let mut cmd = Command::new(&program);
        cmd.args(&argv[1..]);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd.stdin(if self.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                tracing::error!(%program, "command not found");
                Error::MissingDependency(program.clone())
            } else {
                Error::Io(e)
            }
        })?;

        if let Some(input) = &self.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input.as_bytes()).await?;
            }
        }

        let result = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&result.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&result.stderr).into_owned();

        if !stdout.is_empty() {
            tracing::debug!(%stdout, program = %program, "command stdout");
        }
        if !stderr.is_empty() {
            tracing::warn!(%stderr, program = %program, "command stderr");
        }

        if result.status.success() {
            Ok(Output { stdout, stderr })
        } else {
            tracing::error!(command = %argv.join(" "), "command failed");
            Err(Error::SystemCommand {
                command: argv.join(" "),
                stderr,
            })
        }
    }
}

fn running_as_root() -> bool {
    // SAFETY: `geteuid` takes no arguments and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Check whether `name` is available on `PATH`, the async counterpart of
/// `shutil.which`.
pub fn check_dependency(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_simple_command() {
        let out = SystemCommand::new(["echo", "hello"]).run().await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_system_command_error() {
        let err = SystemCommand::new(["sh", "-c", "exit 3"]).run().await.unwrap_err();
        assert!(matches!(err, Error::SystemCommand { .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_missing_dependency_error() {
        let err = SystemCommand::new(["tpt-definitely-not-a-real-binary"])
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingDependency(_)));
    }

    #[tokio::test]
    async fn stdin_is_piped_through() {
        let out = SystemCommand::new(["cat"]).stdin("piped text").run().await.unwrap();
        assert_eq!(out.stdout, "piped text");
    }

    #[test]
    fn check_dependency_finds_sh() {
        assert!(check_dependency("sh").is_some());
    }

    #[test]
    fn check_dependency_misses_bogus_name() {
        assert!(check_dependency("tpt-definitely-not-a-real-binary").is_none());
    }
}
