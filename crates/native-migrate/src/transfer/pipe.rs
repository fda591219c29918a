//! In-process pipe coupling the export copy loop to the import request.
//!
//! The pipe is a capacity-1 channel of payload chunks, so a write completes
//! only once the import side has taken the previous chunk. Dropping the
//! writer signals EOF. A failed copy must stop the import before the writer
//! is dropped, so a truncated payload is never committed.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::core::ByteStream;
use crate::error::{MigrateError, Result};

/// Destination for payload chunks.
#[async_trait]
pub trait ByteSink: Send {
    /// Write one chunk, waiting for the consumer if it is behind.
    async fn write(&mut self, chunk: Bytes) -> Result<()>;
}

/// Write end of the pipe.
pub struct PipeWriter {
    tx: mpsc::Sender<Result<Bytes>>,
}

impl PipeWriter {
    /// Signal EOF to the reader.
    pub fn close(self) {
        drop(self.tx);
    }
}

#[async_trait]
impl ByteSink for PipeWriter {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| MigrateError::Pipe("import side closed the pipe".into()))
    }
}

/// Create a connected writer/reader pair.
pub fn pipe() -> (PipeWriter, ByteStream) {
    let (tx, rx) = mpsc::channel::<Result<Bytes>>(1);
    let reader = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed();
    (PipeWriter { tx }, reader)
}
