//! Deferred deallocation for audio-thread owned data
//!
//! The audio callback must never free memory. Sample buffers are wrapped
//! in `basedrop::Shared`; when the last reference drops on the audio
//! thread, the allocation is enqueued for a background collector thread
//! instead of being freed in the callback. Dropping on the RT thread is
//! a pointer enqueue; the actual free happens where latency is harmless.

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Global handle for creating `Shared<T>` allocations
///
/// Initialized once; the actual Collector lives on a dedicated thread.
static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// Interval between collection sweeps
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

/// Spawn the collector thread and return a handle to it
fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("sample-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it must be created on its own thread
            let mut collector = Collector::new();

            let handle = collector.handle();
            tx.send(handle).expect("Failed to send GC handle");

            log::info!("Sample GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn sample GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Get a handle for creating `Shared<T>` allocations.
///
/// Lazily starts the collector thread on first use. The handle is
/// lightweight and can be cloned freely.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
