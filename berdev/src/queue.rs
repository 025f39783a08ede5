//! Request queue for submitters that hand requests off instead of calling
//! the device directly.
//!
//! Requests own their buffers. Workers drain the queue one request at a
//! time: pop, run against the device, complete. The queue lock is only held
//! for the pop, so several workers can drain the same queue concurrently.
//! Each dequeued request is completed exactly once.

use crate::device::{BerDevice, Direction};
use crate::error::Completion;
use crate::random::RandomSource;
use crate::storage::BackingStore;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier assigned to a request when it is enqueued.
pub type RequestId = u64;

/// A queued request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Identifier returned by [`RequestQueue::enqueue`].
    pub id: RequestId,
    /// Transfer direction.
    pub direction: Direction,
    /// First logical block.
    pub block: u64,
    /// Number of blocks.
    pub count: u64,
    /// Data to write, or space for the data read.
    pub buffer: Vec<u8>,
}

/// FIFO of pending requests.
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: Mutex<VecDeque<Request>>,
    next_id: AtomicU64,
}

fn zeroed(len: usize) -> Option<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).ok()?;
    buffer.resize(len, 0);
    Some(buffer)
}

impl RequestQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request and return its id.
    pub fn enqueue(&self, direction: Direction, block: u64, count: u64, buffer: Vec<u8>) -> RequestId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().push_back(Request {
            id,
            direction,
            block,
            count,
            buffer,
        });
        tracing::trace!("Queued request {}: dir={:?}, block={}", id, direction, block);
        id
    }

    /// Queue a read of `count` blocks of `page_size` bytes.
    ///
    /// When the read buffer cannot be sized or allocated, the request is
    /// queued with an empty buffer; the device then rejects it when it runs,
    /// with `OutOfRange` if it lies past the device end.
    pub fn enqueue_read(&self, block: u64, count: u64, page_size: u32) -> RequestId {
        let buffer = count
            .checked_mul(u64::from(page_size))
            .and_then(|bytes| usize::try_from(bytes).ok())
            .and_then(zeroed)
            .unwrap_or_default();
        self.enqueue(Direction::Read, block, count, buffer)
    }

    /// Queue a write of `data` in blocks of `page_size`.
    ///
    /// A trailing partial block counts as a block, so the device rejects it
    /// as a short buffer. A zero `page_size` describes no valid range and
    /// the request completes with `OutOfRange`.
    pub fn enqueue_write(&self, block: u64, data: Vec<u8>, page_size: u32) -> RequestId {
        let count = match page_size {
            0 => u64::MAX,
            size => data.len().div_ceil(size as usize) as u64,
        };
        self.enqueue(Direction::Write, block, count, data)
    }

    /// Number of requests waiting.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether no requests are waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    fn pop(&self) -> Option<Request> {
        self.pending.lock().pop_front()
    }

    /// Run queued requests against `device` until the queue is empty.
    ///
    /// `complete` is called once per request with the request (its buffer
    /// holding read data) and its outcome. Returns the number of requests
    /// this call completed.
    pub fn process<S, R, F>(&self, device: &BerDevice<S, R>, mut complete: F) -> usize
    where
        S: BackingStore,
        R: RandomSource,
        F: FnMut(Request, Completion),
    {
        let mut completed = 0;
        while let Some(mut request) = self.pop() {
            let completion = device.submit(
                request.direction,
                request.block,
                request.count,
                &mut request.buffer,
            );
            tracing::trace!("Completing request {}: ok={}", request.id, completion.is_ok());
            complete(request, completion);
            completed += 1;
        }
        completed
    }
}
