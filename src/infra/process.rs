//! External process execution
//!
//! Runs toolchain executables and streams their stdout/stderr lines to an
//! output sink while they run.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::core::sink::OutputSink;
use crate::error::ToolchainError;

/// Options for a spawned process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnOptions {
    /// Working directory
    pub cwd: Option<PathBuf>,
}

impl SpawnOptions {
    /// Run inside `cwd`
    pub fn in_dir(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
        }
    }
}

/// Spawns external processes
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Run `program` to completion
    ///
    /// Output lines go to `sink` when one is given. Exit code 0 is `Ok`;
    /// any other outcome is an error carrying the exit code when there is one.
    async fn spawn(
        &self,
        program: &Path,
        sink: Option<&dyn OutputSink>,
        args: &[String],
        options: &SpawnOptions,
    ) -> Result<(), ToolchainError>;
}

/// Spawner backed by `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

#[async_trait]
impl ProcessSpawner for TokioSpawner {
    async fn spawn(
        &self,
        program: &Path,
        sink: Option<&dyn OutputSink>,
        args: &[String],
        options: &SpawnOptions,
    ) -> Result<(), ToolchainError> {
        let program_name = program.display().to_string();
        tracing::debug!("Running {} {}", program_name, args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| ToolchainError::Launch {
            program: program_name.clone(),
            error: e.to_string(),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(forward_lines(stdout, sink), forward_lines(stderr, sink));

        let status = child.wait().await.map_err(|e| ToolchainError::Launch {
            program: program_name.clone(),
            error: e.to_string(),
        })?;

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => {
                tracing::debug!("{} exited with code {}", program_name, code);
                Err(ToolchainError::NonZeroExit {
                    program: program_name,
                    code,
                })
            }
            None => Err(ToolchainError::Terminated {
                program: program_name,
            }),
        }
    }
}

/// Forward every line of `reader` to `sink`
async fn forward_lines<R: AsyncRead + Unpin>(reader: Option<R>, sink: Option<&dyn OutputSink>) {
    let Some(reader) = reader else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Err(e) => {
                // Keep the pipe empty so the child never blocks on a full buffer
                tracing::warn!("Failed to read toolchain output: {}", e);
                if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                    tracing::debug!("Discarding remaining output failed: {}", e);
                }
                break;
            }
            Ok(_) => {
                if let Some(sink) = sink {
                    let line = String::from_utf8_lossy(&buffer);
                    sink.line(line.trim_end_matches(['\r', '\n']));
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::sink::MemorySink;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_success_streams_output() {
        let sink = MemorySink::new();
        let result = TokioSpawner
            .spawn(
                Path::new("sh"),
                Some(&sink),
                &sh("echo compiling; echo warning >&2"),
                &SpawnOptions::default(),
            )
            .await;

        assert!(result.is_ok());
        assert!(sink.contains("compiling"));
        assert!(sink.contains("warning"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_code() {
        let result = TokioSpawner
            .spawn(Path::new("sh"), None, &sh("exit 3"), &SpawnOptions::default())
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), Some(3));
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let sink = MemorySink::new();

        TokioSpawner
            .spawn(
                Path::new("sh"),
                Some(&sink),
                &sh("ls"),
                &SpawnOptions::in_dir(dir.path()),
            )
            .await
            .unwrap();
        assert!(sink.contains("marker.txt"));
    }

    /// Reader yielding scripted chunks, then end of file
    struct ScriptedReader {
        chunks: VecDeque<std::io::Result<&'static [u8]>>,
    }

    impl AsyncRead for ScriptedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            match self.chunks.pop_front() {
                Some(Ok(bytes)) => {
                    buf.put_slice(bytes);
                    Poll::Ready(Ok(()))
                }
                Some(Err(e)) => Poll::Ready(Err(e)),
                None => Poll::Ready(Ok(())),
            }
        }
    }

    #[tokio::test]
    async fn test_read_error_drains_remaining_output() {
        let mut reader = ScriptedReader {
            chunks: VecDeque::from([
                Ok(&b"compiling\n"[..]),
                Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad read")),
                Ok(&b"linking\n"[..]),
                Ok(&b"done\n"[..]),
            ]),
        };
        let sink = MemorySink::new();

        forward_lines(Some(&mut reader), Some(&sink)).await;

        assert!(sink.contains("compiling"));
        assert!(!sink.contains("linking"));
        assert!(reader.chunks.is_empty());
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let result = TokioSpawner
            .spawn(
                Path::new("/nonexistent/arduino"),
                None,
                &[],
                &SpawnOptions::default(),
            )
            .await;
        assert!(matches!(result, Err(ToolchainError::Launch { .. })));
    }
}
