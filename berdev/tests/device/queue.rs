//! Request queue tests.
//!
//! Workers drain a shared queue concurrently; every request must be
//! completed exactly once.

use berdev::{BerDevice, DeviceConfig, FailureKind, RequestQueue, ScriptedRandomSource};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Every enqueued request is completed once, whichever worker takes it.
#[test]
fn test_each_request_completed_once() {
    let config = DeviceConfig::default().page_size(512).page_count(128);
    let device = BerDevice::in_memory(config, ScriptedRandomSource::never_bad()).expect("device");
    let queue = RequestQueue::new();

    let mut expected = Vec::new();
    for block in 0..128u64 {
        expected.push(queue.enqueue_write(block, vec![block as u8; 512], 512));
    }
    // past the end
    expected.push(queue.enqueue_read(128, 1, 512));

    let completions = Mutex::new(HashMap::new());
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                queue.process(&device, |request, completion| {
                    let previous = completions
                        .lock()
                        .insert(request.id, completion.map_err(|e| e.kind()));
                    assert!(previous.is_none(), "request {} completed twice", request.id);
                });
            });
        }
    });

    let completions = completions.into_inner();
    assert_eq!(completions.len(), expected.len());
    for id in &expected[..128] {
        assert_eq!(completions[id], Ok(512));
    }
    assert_eq!(completions[&expected[128]], Err(FailureKind::OutOfRange));
    assert!(queue.is_empty());
}

/// Queued reads of bad blocks complete with a read error.
#[test]
fn test_queued_read_error() {
    let config = DeviceConfig::always_fail().page_size(512).page_count(4);
    let device = BerDevice::in_memory(config, ScriptedRandomSource::never_bad()).expect("device");
    let queue = RequestQueue::new();

    queue.enqueue_write(1, vec![7; 512], 512);
    queue.enqueue_read(1, 1, 512);

    let mut outcomes = Vec::new();
    let done = queue.process(&device, |_, completion| {
        outcomes.push(completion.map_err(|e| e.kind()));
    });
    assert_eq!(done, 2);
    assert_eq!(outcomes, vec![Ok(512), Err(FailureKind::ReadError)]);
}
