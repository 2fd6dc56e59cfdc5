//! Reading child output as it arrives.

use super::sink::OutputSink;
use tokio::io::{AsyncRead, AsyncReadExt};

const CHUNK_SIZE: usize = 8 * 1024;

/// Incremental UTF-8 decoding across read boundaries.
///
/// A multi-byte character split between two reads is held back until the rest
/// arrives. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete tail; wait for more bytes.
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Forward every chunk of `reader` to `sink` and return the full text.
///
/// Returns only after EOF, so every append happens before the caller observes
/// completion.
pub(crate) async fn stream_to_sink<R: AsyncRead + Unpin>(
    mut reader: R,
    sink: &dyn OutputSink,
) -> std::io::Result<String> {
    let mut captured = String::new();
    let mut decoder = Utf8Decoder::default();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut chunks = 0usize;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let text = decoder.push(&buf[..n]);
        if !text.is_empty() {
            sink.append(&text);
            captured.push_str(&text);
            chunks += 1;
        }
    }

    let rest = decoder.finish();
    if !rest.is_empty() {
        sink.append(&rest);
        captured.push_str(&rest);
        chunks += 1;
    }

    tracing::debug!(chunks, bytes = captured.len(), "stdout closed");
    Ok(captured)
}

/// Collect a whole stream without forwarding it anywhere.
pub(crate) async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut r) = reader {
        if let Err(e) = r.read_to_end(&mut buf).await {
            tracing::debug!(error = %e, read = buf.len(), "stderr read failed");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sink::MemorySink;

    #[test]
    fn split_multibyte_char_is_carried_over() {
        let bytes = "λx".as_bytes();
        let mut d = Utf8Decoder::default();
        assert_eq!(d.push(&bytes[..1]), "");
        assert_eq!(d.push(&bytes[1..]), "λx");
        assert_eq!(d.finish(), "");
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let mut d = Utf8Decoder::default();
        assert_eq!(d.push(b"ok\xffok"), "ok\u{FFFD}ok");
    }

    #[test]
    fn truncated_tail_is_flushed_lossily() {
        let mut d = Utf8Decoder::default();
        assert_eq!(d.push(&"é".as_bytes()[..1]), "");
        assert_eq!(d.finish(), "\u{FFFD}");
    }

    #[tokio::test]
    async fn stream_forwards_and_captures() {
        let sink = MemorySink::default();
        let input: &[u8] = b"Standard ML of New Jersey\n- ";
        let captured = stream_to_sink(input, &sink).await.unwrap();
        assert_eq!(captured, "Standard ML of New Jersey\n- ");
        assert_eq!(sink.snapshot().contents, captured);
    }

    struct FailingReader {
        sent: bool,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.sent {
                return std::task::Poll::Ready(Err(std::io::Error::other("pipe broke")));
            }
            self.sent = true;
            buf.put_slice(b"uncaught exception");
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn stderr_read_error_keeps_what_was_read() {
        let text = read_all(Some(FailingReader { sent: false })).await;
        assert_eq!(text, "uncaught exception");
    }

    #[tokio::test]
    async fn missing_stderr_reads_as_empty() {
        assert_eq!(read_all(None::<&[u8]>).await, "");
    }
}
