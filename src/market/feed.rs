use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One push from the reference-exchange stream (miniTicker-shaped).
#[derive(Clone, Copy, Debug)]
pub struct ReferenceUpdate {
    pub price: f64,
    pub volume: f64,
    pub ts_ms: i64,
}

/// Bounded single-producer/single-consumer handoff between a streaming feed
/// task and the tick engine. Producers push from their own scheduler; the
/// engine drains everything at the top of each tick. When the producer
/// outruns the consumer the OLDEST samples are dropped silently —
/// correctness never depends on replaying them.
pub struct FeedHandoff {
    cap: usize,
    buf: Mutex<VecDeque<(String, ReferenceUpdate)>>,
}

impl FeedHandoff {
    pub fn new(cap: usize) -> Arc<Self> {
        Arc::new(Self {
            cap: cap.max(1),
            buf: Mutex::new(VecDeque::with_capacity(cap.max(1))),
        })
    }

    /// Producer side: never blocks, never errors.
    pub fn publish(&self, asset: &str, update: ReferenceUpdate) {
        let mut buf = self.buf.lock().unwrap();
        if buf.len() == self.cap {
            buf.pop_front();
        }
        buf.push_back((asset.to_string(), update));
    }

    /// Consumer side: take everything accumulated since the last drain,
    /// oldest first.
    pub fn drain(&self) -> Vec<(String, ReferenceUpdate)> {
        let mut buf = self.buf.lock().unwrap();
        buf.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.buf.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.lock().unwrap().is_empty()
    }
}
