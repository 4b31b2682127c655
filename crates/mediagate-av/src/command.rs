//! Builder for running ffmpeg/ffprobe to completion with a timeout.
//!
//! Long-running encodes do not go through here; see
//! [`crate::transcode::TranscodeSupervisor`].

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use mediagate_common::{ByteStream, Error, Result};
use tokio::process::Command;
use tokio_util::io::StreamReader;

/// Default command timeout: 2 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for one external tool invocation.
///
/// ```no_run
/// use mediagate_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> mediagate_common::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json", "-show_format"])
///     .arg("/srv/media/film.mkv")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn command(&self, stdin: Stdio) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Execute the command with stdin closed, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tool`] when the process cannot be spawned, exits
    /// with a non-zero status (message includes stderr), or runs past the
    /// timeout. A timed-out process is killed.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let child = self
            .command(Stdio::null())
            .spawn()
            .map_err(|e| Error::tool(self.tool_name(), format!("failed to spawn: {e}")))?;
        self.finish(child).await
    }

    /// Execute the command while copying `input` into its stdin.
    ///
    /// The copy stops as soon as the process exits; a tool that reads only
    /// the head of its input (ffprobe) is not an error.
    pub async fn execute_piped(&self, input: ByteStream) -> Result<ToolOutput> {
        let mut child = self
            .command(Stdio::piped())
            .spawn()
            .map_err(|e| Error::tool(self.tool_name(), format!("failed to spawn: {e}")))?;

        let pump = child.stdin.take().map(|mut stdin| {
            let tool = self.tool_name();
            tokio::spawn(async move {
                let mut reader = StreamReader::new(input);
                if let Err(e) = tokio::io::copy(&mut reader, &mut stdin).await {
                    tracing::debug!(tool = %tool, error = %e, "stdin copy ended early");
                }
            })
        });

        let result = self.finish(child).await;
        if let Some(pump) = pump {
            pump.abort();
        }
        result
    }

    async fn finish(&self, child: tokio::process::Child) -> Result<ToolOutput> {
        let tool = self.tool_name();
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::tool(tool, format!("I/O error waiting for process: {e}")))
            }
            // Dropping the future drops the child, and kill_on_drop reaps it.
            Err(_) => return Err(Error::tool(tool, format!("timed out after {:?}", self.timeout))),
        };

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            return Err(Error::tool(
                tool,
                format!(
                    "exited with status {}: {}",
                    output.status,
                    tool_output.stderr.trim()
                ),
            ));
        }

        Ok(tool_output)
    }
}
