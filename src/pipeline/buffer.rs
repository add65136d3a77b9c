//! Bounded FIFO buffers connecting adjacent stages.
//!
//! A buffer has exactly one [`BufferWriter`] and one [`BufferReader`]. The
//! writer is not `Clone`, and [`BufferWriter::close`] consumes it, so the
//! type system enforces "closed at most once, only by its producer".
//! Dropping a writer also closes the buffer, which keeps a panicking
//! producer from leaving its consumer blocked forever.

use super::cancel::CancellationToken;
use crate::errors::PipelineError;
use crossbeam::channel::{self, Receiver, Sender};

/// Create a buffer with room for `capacity` items.
///
/// Writers block once `capacity` items are waiting (backpressure). A
/// capacity of zero would turn the buffer into a rendezvous channel;
/// configuration rejects it before it gets here.
pub fn buffer<T>(capacity: usize) -> (BufferWriter<T>, BufferReader<T>) {
    let (tx, rx) = channel::bounded(capacity);
    (BufferWriter { tx }, BufferReader { rx })
}

/// Producing end of a buffer.
pub struct BufferWriter<T> {
    tx: Sender<T>,
}

impl<T> BufferWriter<T> {
    /// Append `item`, blocking while the buffer is full.
    ///
    /// Returns `Cancelled` if the pipeline aborts while blocked, and
    /// `Disconnected` if the reader is gone.
    pub fn send(&self, item: T, cancel: &CancellationToken) -> Result<(), PipelineError> {
        cancel.check()?;
        crossbeam::select! {
            send(self.tx, item) -> res => res.map_err(|_| PipelineError::Disconnected),
            recv(cancel.signal()) -> _ => Err(PipelineError::Cancelled),
        }
    }

    /// Close the buffer. The reader drains what is left, then sees the end.
    pub fn close(self) {
        drop(self.tx);
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }
}

/// Consuming end of a buffer.
pub struct BufferReader<T> {
    rx: Receiver<T>,
}

impl<T> BufferReader<T> {
    /// Take the next item.
    ///
    /// `Ok(None)` means the buffer was closed and fully drained.
    pub fn recv(&self, cancel: &CancellationToken) -> Result<Option<T>, PipelineError> {
        cancel.check()?;
        crossbeam::select! {
            recv(self.rx) -> msg => Ok(msg.ok()),
            recv(cancel.signal()) -> _ => Err(PipelineError::Cancelled),
        }
    }

    /// Iterate until the buffer is closed and drained, or the pipeline aborts.
    pub fn iter<'a>(&'a self, cancel: &'a CancellationToken) -> BufferIter<'a, T> {
        BufferIter { reader: self, cancel }
    }

    /// Read everything into a `Vec`.
    pub fn drain_all(&self, cancel: &CancellationToken) -> Result<Vec<T>, PipelineError> {
        self.iter(cancel).collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Iterator returned by [`BufferReader::iter`].
pub struct BufferIter<'a, T> {
    reader: &'a BufferReader<T>,
    cancel: &'a CancellationToken,
}

impl<T> Iterator for BufferIter<'_, T> {
    type Item = Result<T, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.recv(self.cancel).transpose()
    }
}
