//! Attach sessions and the client side of the attach handshake.
//!
//! The client writes one JSON request line, then the agent answers with a
//! status byte: success (stream is live), waiting (job not started yet; a
//! second status byte follows once it has), or error followed by a message
//! line. After success the connection carries the job's stdio.

use crate::{DockyardError, Result};
use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::ops::BitOr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

pub const ATTACH_SUCCESS: u8 = 0x01;
pub const ATTACH_WAITING: u8 = 0x02;
pub const ATTACH_ERROR: u8 = 0x03;

const MAX_ERROR_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct AttachFlags(u8);

impl AttachFlags {
    pub const STDOUT: AttachFlags = AttachFlags(1);
    pub const STDERR: AttachFlags = AttachFlags(1 << 1);
    pub const STDIN: AttachFlags = AttachFlags(1 << 2);
    pub const LOGS: AttachFlags = AttachFlags(1 << 3);
    pub const STREAM: AttachFlags = AttachFlags(1 << 4);

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: AttachFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Full interactive session: both output streams, stdin and live streaming.
    pub const fn interactive() -> Self {
        AttachFlags(Self::STDOUT.0 | Self::STDERR.0 | Self::STDIN.0 | Self::STREAM.0)
    }
}

impl BitOr for AttachFlags {
    type Output = AttachFlags;

    fn bitor(self, rhs: AttachFlags) -> AttachFlags {
        AttachFlags(self.0 | rhs.0)
    }
}

/// Duplex byte stream carrying a job's stdio.
pub trait AttachStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AttachStream for T {}

pub type BoxedStream = Box<dyn AttachStream>;

/// A pending connection to a job's stdio.
///
/// Obtaining a session does not mean the job is running: the stream is only
/// handed out by [`AttachSession::confirm_ready`], which blocks until the job
/// has started.
pub struct AttachSession {
    job_id: String,
    ready: BoxFuture<'static, Result<BoxedStream>>,
}

impl AttachSession {
    pub fn new<F>(job_id: impl Into<String>, ready: F) -> Self
    where
        F: Future<Output = Result<BoxedStream>> + Send + 'static,
    {
        Self {
            job_id: job_id.into(),
            ready: Box::pin(ready),
        }
    }

    /// A session whose job is already running.
    pub fn live(job_id: impl Into<String>, stream: BoxedStream) -> Self {
        Self::new(job_id, async move { Ok(stream) })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub async fn confirm_ready(self) -> Result<BoxedStream> {
        let stream = self.ready.await?;
        debug!("Attach to {} is live", self.job_id);
        Ok(stream)
    }
}

impl fmt::Debug for AttachSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachSession")
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct AttachRequest<'a> {
    #[serde(rename = "JobID")]
    job_id: &'a str,

    #[serde(rename = "Flags")]
    flags: AttachFlags,

    #[serde(rename = "WaitForStart")]
    wait_for_start: bool,
}

enum AttachStatus {
    Success,
    Waiting,
}

/// Run the attach handshake over an established connection.
pub async fn handshake<S>(
    mut stream: S,
    job_id: &str,
    flags: AttachFlags,
    wait_for_start: bool,
) -> Result<AttachSession>
where
    S: AttachStream + 'static,
{
    let request = AttachRequest {
        job_id,
        flags,
        wait_for_start,
    };
    let mut line = serde_json::to_vec(&request)
        .map_err(|e| DockyardError::AttachError(format!("Failed to encode request: {}", e)))?;
    line.push(b'\n');

    stream
        .write_all(&line)
        .await
        .map_err(|e| DockyardError::AttachError(format!("Failed to send request: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| DockyardError::AttachError(format!("Failed to send request: {}", e)))?;

    match read_status(&mut stream, job_id).await? {
        AttachStatus::Success => Ok(AttachSession::live(job_id, Box::new(stream))),
        AttachStatus::Waiting => {
            debug!("Job {} not started yet, waiting", job_id);
            let id = job_id.to_string();
            Ok(AttachSession::new(job_id, async move {
                match read_status(&mut stream, &id).await? {
                    AttachStatus::Success => Ok(Box::new(stream) as BoxedStream),
                    AttachStatus::Waiting => Err(DockyardError::AttachError(format!(
                        "Unexpected second waiting status for {}",
                        id
                    ))),
                }
            }))
        }
    }
}

async fn read_status<S>(stream: &mut S, job_id: &str) -> Result<AttachStatus>
where
    S: AsyncRead + Unpin,
{
    let status = stream.read_u8().await.map_err(|e| {
        DockyardError::AttachError(format!("Connection closed while attaching to {}: {}", job_id, e))
    })?;

    match status {
        ATTACH_SUCCESS => Ok(AttachStatus::Success),
        ATTACH_WAITING => Ok(AttachStatus::Waiting),
        ATTACH_ERROR => {
            let message = read_error_message(stream).await;
            Err(DockyardError::AttachError(format!("{}: {}", job_id, message)))
        }
        other => Err(DockyardError::AttachError(format!(
            "Unknown attach status {:#04x} for {}",
            other, job_id
        ))),
    }
}

async fn read_error_message<S>(stream: &mut S) -> String
where
    S: AsyncRead + Unpin,
{
    let mut message = Vec::new();
    while message.len() < MAX_ERROR_LEN {
        match stream.read_u8().await {
            Ok(b'\n') | Err(_) => break,
            Ok(byte) => message.push(byte),
        }
    }
    String::from_utf8_lossy(&message).trim().to_string()
}
