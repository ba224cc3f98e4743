//! MongoshRunner trait and MongoshExecutor (sync subprocess wrapper).
//! The trait exists so sessions can be tested with a mock runner.

use clusterstat_core::SourceError;

/// Trait for executing mongosh. Enables mock injection for testing.
pub trait MongoshRunner: Send + Sync {
    fn run(&self, args: &[String]) -> Result<String, SourceError>;
}

impl<T: MongoshRunner + ?Sized> MongoshRunner for &T {
    fn run(&self, args: &[String]) -> Result<String, SourceError> {
        (**self).run(args)
    }
}

/// Real mongosh executor using `std::process::Command`.
#[derive(Debug, Clone)]
pub struct MongoshExecutor {
    mongosh_bin: String,
}

impl MongoshExecutor {
    pub fn new(mongosh_bin: impl Into<String>) -> Self {
        Self {
            mongosh_bin: mongosh_bin.into(),
        }
    }

    pub fn bin(&self) -> &str {
        &self.mongosh_bin
    }
}

impl Default for MongoshExecutor {
    fn default() -> Self {
        Self::new("mongosh")
    }
}

impl MongoshRunner for MongoshExecutor {
    fn run(&self, args: &[String]) -> Result<String, SourceError> {
        let output = std::process::Command::new(&self.mongosh_bin)
            .args(args)
            .output()
            .map_err(SourceError::Io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::CommandFailed(format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
