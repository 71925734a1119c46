//! Coalescing async front-end for the line writer.
//!
//! High-fanout hubs write the same broadcast to hundreds of connections;
//! flushing each line individually wastes syscalls. This module moves the
//! [`Writer`](super::Writer) into a dedicated scheduler task fed through a
//! channel: lines submitted within a short window are batched into a
//! single flush, and an explicit flush drains everything already
//! submitted before returning.
//!
//! ```text
//! write_async ─┐
//! write_async ─┼─► mpsc::Sender<Op> ─► scheduler task ─► Writer ─► transport
//! flush ───────┘
//! ```
//!
//! The underlying writer is synchronous, so each collected batch is
//! written and flushed on the blocking thread pool; the scheduler task
//! itself never blocks a runtime worker.
//!
//! Ordering follows channel-insertion order; the scheduler only decides
//! *when* to flush, never reorders buffered bytes.

use std::io::Write;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use super::Writer;
use crate::error::{DcError, Result};

/// Default coalescing window before a scheduled batch is flushed.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(15);

/// Default channel capacity for queued lines.
const DEFAULT_QUEUE: usize = 1024;

/// Configuration for the async writer task.
#[derive(Debug, Clone)]
pub struct AsyncWriterConfig {
    /// How long a freshly-buffered line may wait for more lines before
    /// the batch is flushed.
    pub flush_delay: Duration,
    /// Capacity of the line queue.
    pub queue: usize,
}

impl Default for AsyncWriterConfig {
    fn default() -> Self {
        AsyncWriterConfig {
            flush_delay: DEFAULT_FLUSH_DELAY,
            queue: DEFAULT_QUEUE,
        }
    }
}

enum Op {
    Line(Vec<u8>),
    Flush(oneshot::Sender<Result<()>>),
}

/// Handle for submitting lines to the scheduler task. Cheaply cloneable.
#[derive(Clone)]
pub struct AsyncWriter {
    tx: mpsc::Sender<Op>,
}

impl AsyncWriter {
    /// Enqueues a single framed line. The line is put on the wire when
    /// the coalescing window expires or a flush is requested.
    pub async fn write_async(&self, line: impl Into<Vec<u8>>) -> Result<()> {
        self.tx
            .send(Op::Line(line.into()))
            .await
            .map_err(|_| closed())
    }

    /// Flushes the writer, waiting for every line submitted before this
    /// call to drain to the transport.
    pub async fn flush(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx.send(Op::Flush(ack)).await.map_err(|_| closed())?;
        done.await.map_err(|_| closed())?
    }
}

fn closed() -> DcError {
    DcError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "async writer task is gone",
    ))
}

/// Moves the writer into a scheduler task and returns the submission
/// handle. The task exits when every handle is dropped or the writer
/// fails.
pub fn spawn_async_writer<W>(
    writer: Writer<W>,
    config: AsyncWriterConfig,
) -> (AsyncWriter, JoinHandle<Result<()>>)
where
    W: Write + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.queue);
    let task = tokio::spawn(scheduler_loop(rx, writer, config.flush_delay));
    (AsyncWriter { tx }, task)
}

async fn scheduler_loop<W>(
    mut rx: mpsc::Receiver<Op>,
    mut writer: Writer<W>,
    delay: Duration,
) -> Result<()>
where
    W: Write + Send + 'static,
{
    loop {
        // sleep until woken by a newly-scheduled line or a flush request
        let first = match rx.recv().await {
            Some(op) => op,
            None => {
                let (_, res) = write_batch(writer, Vec::new()).await?;
                return res;
            }
        };
        let mut batch: Vec<Vec<u8>> = Vec::new();
        let mut ack = None;
        match first {
            Op::Flush(a) => ack = Some(a),
            Op::Line(line) => {
                batch.push(line);
                // collect more lines until the window expires or a flush
                // arrives
                let deadline = Instant::now() + delay;
                loop {
                    match timeout_at(deadline, rx.recv()).await {
                        Err(_) => break, // window expired
                        Ok(None) => break,
                        Ok(Some(Op::Line(line))) => batch.push(line),
                        Ok(Some(Op::Flush(a))) => {
                            ack = Some(a);
                            break;
                        }
                    }
                }
            }
        }
        let (w, res) = write_batch(writer, batch).await?;
        writer = w;
        match res {
            Ok(()) => {
                if let Some(ack) = ack.take() {
                    let _ = ack.send(Ok(()));
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "async writer: batch write failed");
                if let Some(ack) = ack.take() {
                    let _ = ack.send(Err(e));
                    return Err(closed());
                }
                return Err(e);
            }
        }
    }
}

/// Writes and flushes one batch on the blocking thread pool, handing the
/// writer back for the next round. The outer error means the blocking
/// task was lost (runtime shutdown or a writer panic), the inner one is
/// the write result.
async fn write_batch<W>(writer: Writer<W>, batch: Vec<Vec<u8>>) -> Result<(Writer<W>, Result<()>)>
where
    W: Write + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut writer = writer;
        let res = (|| {
            for line in &batch {
                writer.write_line(line)?;
            }
            writer.flush()
        })();
        (writer, res)
    })
    .await
    .map_err(|_| closed())
}
