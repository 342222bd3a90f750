//! SSH session over the system `ssh` client
//!
//! Uses `tokio::process::Command` with `sshpass -e` for password-based SSH.
//! The child is spawned with `kill_on_drop`, and `close` is called on every
//! path by the connector, so no session outlives its device backup.

use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::DeviceError;

/// sshpass: incorrect password
const SSHPASS_BAD_PASSWORD: i32 = 5;
/// sshpass: host public key unknown
const SSHPASS_HOST_KEY_UNKNOWN: i32 = 6;
/// ssh: connection-level error
const SSH_CONNECTION_ERROR: i32 = 255;

const CONNECT_MARKERS: &[&str] = &[
    "connection refused",
    "connection timed out",
    "operation timed out",
    "no route to host",
    "network is unreachable",
    "could not resolve hostname",
    "name or service not known",
    "connection reset",
    "connection closed by",
];

const AUTH_MARKERS: &[&str] = &[
    "permission denied",
    "authentication failed",
    "too many authentication failures",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Remote side closed the stream
    Closed,
    TimedOut,
    Io(String),
}

/// Exit status and stderr of a finished session
#[derive(Debug, Clone, Default)]
pub struct SessionExit {
    pub code: Option<i32>,
    pub stderr: String,
}

impl SessionExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub struct SshSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    buffer: Vec<u8>,
}

impl SshSession {
    /// Spawn the client; `command` must pipe all three standard streams
    pub fn spawn(mut command: Command) -> Result<Self, DeviceError> {
        let mut child = command
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeviceError::Other(format!("SSH exec failed: {} (is sshpass installed?)", e)))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DeviceError::Other("SSH stdout not captured".to_string()))?;

        let stderr = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text).await;
                text
            })
        });

        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
            buffer: Vec::new(),
        })
    }

    pub async fn send_line(&mut self, line: &str) -> Result<(), ReadError> {
        let stdin = self.stdin.as_mut().ok_or(ReadError::Closed)?;
        stdin
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(|_| ReadError::Closed)?;
        stdin.flush().await.map_err(|_| ReadError::Closed)
    }

    /// Read until the last line matches one of `patterns`
    ///
    /// Returns the index of the matching pattern and everything read so far,
    /// prompt included.
    pub async fn read_until(
        &mut self,
        patterns: &[&Regex],
        timeout: Duration,
    ) -> Result<(usize, String), ReadError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 4096];

        loop {
            if let Some(idx) = self.match_tail(patterns) {
                let text = String::from_utf8_lossy(&self.buffer).into_owned();
                self.buffer.clear();
                return Ok((idx, text));
            }

            match tokio::time::timeout_at(deadline, self.stdout.read(&mut chunk)).await {
                Err(_) => return Err(ReadError::TimedOut),
                Ok(Err(e)) => return Err(ReadError::Io(e.to_string())),
                Ok(Ok(0)) => return Err(ReadError::Closed),
                Ok(Ok(n)) => self.buffer.extend_from_slice(&chunk[..n]),
            }
        }
    }

    /// Read stdout to EOF
    pub async fn read_to_end(&mut self, timeout: Duration) -> Result<String, ReadError> {
        // Exec sessions take no input
        drop(self.stdin.take());

        let mut out = std::mem::take(&mut self.buffer);
        match tokio::time::timeout(timeout, self.stdout.read_to_end(&mut out)).await {
            Err(_) => Err(ReadError::TimedOut),
            Ok(Err(e)) => Err(ReadError::Io(e.to_string())),
            Ok(Ok(_)) => Ok(String::from_utf8_lossy(&out).into_owned()),
        }
    }

    fn match_tail(&self, patterns: &[&Regex]) -> Option<usize> {
        let start = self
            .buffer
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|p| p + 1)
            .unwrap_or(0);
        let tail = String::from_utf8_lossy(&self.buffer[start..]);
        let tail = tail.trim_start_matches('\r');
        if tail.is_empty() {
            return None;
        }
        patterns.iter().position(|re| re.is_match(tail))
    }

    /// Leave the device and reap the client, killing it after `grace`
    pub async fn close(mut self, exit_command: Option<&str>, grace: Duration) -> SessionExit {
        if let Some(cmd) = exit_command {
            let _ = self.send_line(cmd).await;
        }
        drop(self.stdin.take());

        let code = match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => status.code(),
            _ => {
                if let Err(e) = self.child.kill().await {
                    tracing::debug!("SSH client kill failed: {}", e);
                }
                None
            }
        };

        let stderr = match self.stderr.take() {
            Some(handle) => tokio::time::timeout(grace, handle)
                .await
                .ok()
                .and_then(|r| r.ok())
                .unwrap_or_default(),
            None => String::new(),
        };

        SessionExit { code, stderr }
    }
}

/// Map a session that ended on its own to a device failure
pub fn classify_exit(exit: &SessionExit) -> DeviceError {
    let stderr = exit.stderr.trim();
    let lower = stderr.to_lowercase();
    let detail = if stderr.is_empty() {
        match exit.code {
            Some(code) => format!("session closed with exit status {}", code),
            None => "session closed unexpectedly".to_string(),
        }
    } else {
        stderr.lines().last().unwrap_or(stderr).to_string()
    };

    if exit.code == Some(SSHPASS_BAD_PASSWORD) {
        return DeviceError::Auth("incorrect password".to_string());
    }
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        return DeviceError::Auth(detail);
    }
    if exit.code == Some(SSHPASS_HOST_KEY_UNKNOWN) {
        return DeviceError::Other("host public key is unknown".to_string());
    }
    if CONNECT_MARKERS.iter().any(|m| lower.contains(m)) || exit.code == Some(SSH_CONNECTION_ERROR)
    {
        return DeviceError::Connect(detail);
    }

    DeviceError::Other(detail)
}
