//! Runner for external tool invocations (ffmpeg, the stem separator).

use std::ffi::OsStr;
use std::io;
use std::process::Stdio;

use tokio::process::Command;

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    /// The last stderr lines, which is where ffmpeg and friends put the
    /// actual reason for a failure.
    pub fn stderr_tail(&self) -> String {
        let tail: Vec<&str> = self.stderr.lines().rev().take(8).collect();
        tail.into_iter().rev().collect::<Vec<_>>().join("\n")
    }
}

#[derive(Clone, Debug, Default)]
pub struct CommandRunner;

impl CommandRunner {
    /// Run `program` to completion, capturing both output streams.
    ///
    /// A spawn failure (typically the tool not being installed) comes
    /// back as the `Err` branch; a nonzero exit is a successful run with
    /// `success == false`.
    pub async fn run<I, S>(&self, program: impl AsRef<OsStr>, args: I) -> io::Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }
}
