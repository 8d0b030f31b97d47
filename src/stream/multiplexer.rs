use super::framing::{read_frame, FRAME_HEADER_LEN};
use crate::agent::BoxedStream;
use crate::{DockyardError, Result};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

/// Totals for one finished stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub lines: u64,
}

/// Pumps a local input into an attached job and the job's output back out.
///
/// The stream is split into independent halves. Input is copied by a
/// background task which half-closes the write side once the input is
/// exhausted. Output is copied in the foreground; end-of-stream on the read
/// side ends the session regardless of where the input copy is.
#[derive(Debug, Clone)]
pub struct StreamMultiplexer {
    header_len: usize,
}

impl StreamMultiplexer {
    pub fn new() -> Self {
        Self {
            header_len: FRAME_HEADER_LEN,
        }
    }

    pub fn with_header_len(header_len: usize) -> Self {
        Self { header_len }
    }

    pub async fn run<R, W>(
        &self,
        stream: BoxedStream,
        input: R,
        output: &mut W,
    ) -> Result<StreamSummary>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);

        let input_task = tokio::spawn(async move {
            let mut input = input;
            match tokio::io::copy(&mut input, &mut write_half).await {
                Ok(n) => debug!("Forwarded {} bytes of input", n),
                Err(e) => debug!("Input copy stopped: {}", e),
            }
            if let Err(e) = write_half.shutdown().await {
                debug!("Failed to half-close attach stream: {}", e);
            }
        });

        let result = self.copy_output(read_half, output).await;

        if !input_task.is_finished() {
            input_task.abort();
        }

        let summary = result?;
        debug!("Stream closed after {} lines", summary.lines);
        Ok(summary)
    }

    async fn copy_output<R, W>(&self, reader: R, output: &mut W) -> Result<StreamSummary>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut reader = BufReader::new(reader);
        let mut payload = Vec::new();
        let mut summary = StreamSummary::default();

        while read_frame(&mut reader, self.header_len, &mut payload)
            .await
            .map_err(|e| DockyardError::StreamError(format!("Failed to read output: {}", e)))?
        {
            write_line(output, &payload).await?;
            summary.lines += 1;
        }

        output
            .flush()
            .await
            .map_err(|e| DockyardError::StreamError(format!("Failed to flush output: {}", e)))?;

        Ok(summary)
    }
}

impl Default for StreamMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_line<W>(output: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    output
        .write_all(payload)
        .await
        .map_err(|e| DockyardError::StreamError(format!("Failed to write output: {}", e)))?;
    output
        .write_all(b"\n")
        .await
        .map_err(|e| DockyardError::StreamError(format!("Failed to write output: {}", e)))
}
