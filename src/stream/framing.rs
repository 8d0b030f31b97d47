use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Length of the per-line header the agent prepends to multiplexed stdio.
///
/// Byte 0 identifies the source stream (1 = stdout, 2 = stderr); the rest is
/// framing the consumer does not need. Header bytes are opaque and may take
/// any value, including `\n`.
pub const FRAME_HEADER_LEN: usize = 8;

/// Read one frame: `header_len` header bytes, then a payload up to and
/// including the next `\n`.
///
/// The payload is left in `payload` without its line terminator. Returns
/// `false` at end-of-stream; a header cut short by end-of-stream is dropped.
/// A complete header followed by end-of-stream yields an empty payload.
pub async fn read_frame<R>(
    reader: &mut R,
    header_len: usize,
    payload: &mut Vec<u8>,
) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    payload.clear();

    let mut header = vec![0u8; header_len];
    let mut filled = 0;
    while filled < header_len {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }

    reader.read_until(b'\n', payload).await?;
    let len = trim_line_end(payload).len();
    payload.truncate(len);
    Ok(true)
}

/// Strip a trailing `\n` and then a trailing `\r`.
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn frames(input: &[u8], header_len: usize) -> Vec<Vec<u8>> {
        let mut reader = BufReader::new(input);
        let mut payload = Vec::new();
        let mut out = Vec::new();
        while read_frame(&mut reader, header_len, &mut payload).await.unwrap() {
            out.push(payload.clone());
        }
        out
    }

    #[tokio::test]
    async fn test_strips_header_and_newline() {
        let out = frames(b"\x01\0\0\0\0\0\0\x0bhello world\n", FRAME_HEADER_LEN).await;
        assert_eq!(out, vec![b"hello world".to_vec()]);
    }

    #[tokio::test]
    async fn test_header_may_contain_newline() {
        // a 10-byte payload puts 0x0a in the length byte
        let out = frames(b"\x01\0\0\0\0\0\0\x0aapp source\n\x02\n\n\n\n\n\n\nerr\n", 8).await;
        assert_eq!(out, vec![b"app source".to_vec(), b"err".to_vec()]);
    }

    #[tokio::test]
    async fn test_strips_crlf() {
        assert_eq!(frames(b"HEADER!!done\r\n", 8).await, vec![b"done".to_vec()]);
    }

    #[tokio::test]
    async fn test_unterminated_final_line() {
        let out = frames(b"HEADER!!one\nHEADER!!tail", 8).await;
        assert_eq!(out, vec![b"one".to_vec(), b"tail".to_vec()]);
    }

    #[tokio::test]
    async fn test_header_without_payload() {
        assert_eq!(frames(b"HEADER!!\n", 8).await, vec![Vec::<u8>::new()]);
        assert_eq!(frames(b"HEADER!!", 8).await, vec![Vec::<u8>::new()]);
    }

    #[tokio::test]
    async fn test_truncated_header_is_dropped() {
        assert_eq!(frames(b"HEADER!!one\nHEAD", 8).await, vec![b"one".to_vec()]);
        assert!(frames(b"", 8).await.is_empty());
    }

    #[tokio::test]
    async fn test_payload_may_contain_header_bytes() {
        let out = frames(b"HEADER!!HEADER!!x\n", 8).await;
        assert_eq!(out, vec![b"HEADER!!x".to_vec()]);
    }

    #[test]
    fn test_trim_line_end() {
        assert_eq!(trim_line_end(b"a\r\n"), b"a");
        assert_eq!(trim_line_end(b"a\n"), b"a");
        assert_eq!(trim_line_end(b"a\n\n"), b"a\n");
        assert_eq!(trim_line_end(b"a"), b"a");
    }
}
