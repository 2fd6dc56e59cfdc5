//! Destinations for streamed process output.
//!
//! One sink is shared by every invocation of a session. Concurrent invocations
//! interleave their chunks with no ordering between them; each invocation's own
//! captured buffer is unaffected.

#[cfg(test)]
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// Where live process output goes.
pub trait OutputSink: Send + Sync {
    /// Drop whatever the previous invocation left behind.
    fn clear(&self);
    /// Bring the sink to the user's attention.
    fn reveal(&self);
    /// Append a raw stdout chunk.
    fn append(&self, chunk: &str);
}

/// Lines and chunks routed to the terminal writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OutputLine {
    Stdout(String),
    Stderr(String),
    /// Raw chunk written without a trailing newline.
    StdoutChunk(String),
    StderrChunk(String),
    /// Terminate the current chunk line on the given stream, if any.
    Break { stderr: bool },
}

/// Terminal sink feeding the blocking writer task.
pub(crate) struct ConsoleSink {
    tx: UnboundedSender<OutputLine>,
    to_stderr: bool,
}

impl ConsoleSink {
    pub fn new(tx: UnboundedSender<OutputLine>, to_stderr: bool) -> Self {
        Self { tx, to_stderr }
    }
}

impl OutputSink for ConsoleSink {
    fn clear(&self) {
        let _ = self.tx.send(OutputLine::Break {
            stderr: self.to_stderr,
        });
    }

    fn reveal(&self) {
        // A terminal is always in view.
    }

    fn append(&self, chunk: &str) {
        let line = if self.to_stderr {
            OutputLine::StderrChunk(chunk.to_string())
        } else {
            OutputLine::StdoutChunk(chunk.to_string())
        };
        let _ = self.tx.send(line);
    }
}

/// Sink that keeps everything in memory.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryState {
    pub contents: String,
    pub chunks: Vec<String>,
    pub clears: usize,
    pub reveals: usize,
}

#[cfg(test)]
impl MemorySink {
    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().clone()
    }
}

#[cfg(test)]
impl OutputSink for MemorySink {
    fn clear(&self) {
        let mut st = self.state.lock();
        st.contents.clear();
        st.clears += 1;
    }

    fn reveal(&self) {
        self.state.lock().reveals += 1;
    }

    fn append(&self, chunk: &str) {
        let mut st = self.state.lock();
        st.contents.push_str(chunk);
        st.chunks.push(chunk.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_clear_drops_previous_contents() {
        let sink = MemorySink::default();
        sink.append("old run\n");
        sink.clear();
        sink.reveal();
        sink.append("new ");
        sink.append("run\n");
        let st = sink.snapshot();
        assert_eq!(st.contents, "new run\n");
        assert_eq!(st.clears, 1);
        assert_eq!(st.reveals, 1);
        assert_eq!(st.chunks.len(), 3);
    }

    #[test]
    fn console_sink_routes_chunks_by_stream() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ConsoleSink::new(tx, true);
        sink.clear();
        sink.append("- ");
        assert_eq!(rx.try_recv().unwrap(), OutputLine::Break { stderr: true });
        assert_eq!(
            rx.try_recv().unwrap(),
            OutputLine::StderrChunk("- ".into())
        );
    }
}
