/// Bounded output collection
///
/// stdout and stderr are drained by independent threads so a child that
/// fills one pipe cannot deadlock the wait loop, and so each stream's
/// internal line order is preserved. Collection stops at the configured
/// byte limit; the remainder is discarded and the stream marked truncated.
///
/// A reader thread only reaches EOF once every holder of the pipe's write
/// end is gone. The direct child closing its end is not enough: a forked
/// descendant inherits the fd and can hold the stream open after the
/// child has been reaped. Waiting is therefore deadline-based
/// (`wait(timeout)`); the runner escalates to a group kill when a stream
/// misses its deadline, and `abandon` detaches a reader whose holder
/// survived even that.
use crate::config::types::OutputIntegrity;
use std::io::{BufReader, Read};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A stream collector running on its own thread.
pub struct StreamCollector {
    rx: Receiver<(Vec<u8>, OutputIntegrity)>,
    handle: Option<JoinHandle<()>>,
}

impl StreamCollector {
    /// Start draining `stream` up to `limit` bytes.
    pub fn spawn<R: Read + Send + 'static>(stream: R, limit: usize) -> Self {
        let (tx, rx) = channel();
        let handle = thread::spawn(move || {
            let _ = tx.send(collect_stream(stream, limit));
        });
        Self {
            rx,
            handle: Some(handle),
        }
    }

    /// Wait up to `timeout` for the stream to reach EOF or its byte
    /// limit. Returns `None` when the write end is still open at the
    /// deadline; the caller decides how to unblock it (kill the group)
    /// and may wait again.
    pub fn wait(&mut self, timeout: Duration) -> Option<(Vec<u8>, OutputIntegrity)> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                Some((Vec::new(), OutputIntegrity::ReadError))
            }
        }
    }

    /// Give up on a stream whose holder survived the kill. The reader
    /// thread detaches and exits on its own once the holder dies; the
    /// collected bytes are lost and the stream reported truncated.
    pub fn abandon(mut self) -> (Vec<u8>, OutputIntegrity) {
        self.handle.take();
        (Vec::new(), OutputIntegrity::TruncatedByLimit)
    }
}

/// Drain a single stream with a byte limit.
fn collect_stream<R: Read>(stream: R, limit: usize) -> (Vec<u8>, OutputIntegrity) {
    let mut reader = BufReader::new(stream);
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut integrity = OutputIntegrity::Complete;

    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break, // EOF
            Ok(n) => {
                if buffer.len() + n > limit {
                    let remaining = limit - buffer.len();
                    buffer.extend_from_slice(&chunk[..remaining]);
                    integrity = OutputIntegrity::TruncatedByLimit;
                    // Keep draining so the child never blocks on a full
                    // pipe; the bytes are dropped.
                    loop {
                        match reader.read(&mut chunk) {
                            Ok(0) => break,
                            Ok(_) => continue,
                            Err(_) => break,
                        }
                    }
                    break;
                }
                buffer.extend_from_slice(&chunk[..n]);
            }
            Err(e) => {
                integrity = if e.kind() == std::io::ErrorKind::BrokenPipe {
                    OutputIntegrity::TruncatedByProgramClose
                } else {
                    OutputIntegrity::ReadError
                };
                break;
            }
        }
    }

    (buffer, integrity)
}
