//! Thin wrapper around the external command-line tools the backends drive
//! (yosys, nextpnr-ice40, icepack, dfu-util, sby).
//!
//! Tool failures are not reinterpreted: the exit status and stderr are
//! attached to the error as-is.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to find {name} binary: {reason}")]
    NotFound { name: String, reason: String },
    #[error("IO error while running {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} failed: status={status}\n{stderr}")]
    Failed {
        name: String,
        status: String,
        stderr: String,
    },
}

/// Captured result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// A located external executable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalTool {
    name: String,
    path: PathBuf,
}

impl ExternalTool {
    /// Look the tool up on `PATH`.
    #[contracts::debug_requires(!name.is_empty())]
    pub fn locate(name: &str) -> Result<Self, ToolError> {
        let path = which::which(name).map_err(|e| ToolError::NotFound {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!("found {} at {}", name, path.display());
        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    /// Use an explicit binary instead of searching `PATH`.
    #[contracts::debug_requires(!name.is_empty())]
    pub fn with_path<P: AsRef<Path>>(name: &str, path: P) -> Result<Self, ToolError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ToolError::NotFound {
                name: name.to_string(),
                reason: format!("binary not found at: {}", path.display()),
            });
        }
        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the tool and hand back whatever it produced, whatever the exit
    /// status. Callers that give meaning to non-zero codes use this.
    pub fn run_unchecked<I, S>(&self, args: I, cwd: Option<&Path>) -> Result<ToolOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        tracing::debug!("running {:?}", cmd);

        // `output()` drains stdout and stderr concurrently.
        let output = cmd.output().map_err(|source| ToolError::Io {
            name: self.name.clone(),
            source,
        })?;

        Ok(ToolOutput {
            code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run the tool, failing on a non-zero exit.
    pub fn run<I, S>(&self, args: I, cwd: Option<&Path>) -> Result<ToolOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.run_unchecked(args, cwd)?;
        if !output.success {
            let status = output
                .code
                .map_or_else(|| "signal".to_string(), |code| code.to_string());
            tracing::event!(
                tracing::Level::ERROR,
                "{} failed: status={}\n{}",
                self.name,
                status,
                output.stderr,
            );
            return Err(ToolError::Failed {
                name: self.name.clone(),
                status,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}
