//! Mock construction helpers

use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use streamblocks::unit::Publish;

/// Publisher that records every record it is given
#[derive(Default, Clone)]
pub struct RecordingPublisher {
    records: Arc<Mutex<Vec<Value>>>,
}

impl RecordingPublisher {
    pub fn records(&self) -> Vec<Value> {
        self.records.lock().unwrap().clone()
    }
}

impl Publish for RecordingPublisher {
    fn publish(&self, record: Value) {
        self.records.lock().unwrap().push(record);
    }
}

/// Publisher that takes `delay` per record, standing in for a slow host
pub struct SlowPublisher {
    pub delay: Duration,
    inner: RecordingPublisher,
}

impl SlowPublisher {
    pub fn new(delay: Duration) -> (Self, RecordingPublisher) {
        let inner = RecordingPublisher::default();
        (
            Self {
                delay,
                inner: inner.clone(),
            },
            inner,
        )
    }
}

impl Publish for SlowPublisher {
    fn publish(&self, record: Value) {
        std::thread::sleep(self.delay);
        self.inner.publish(record);
    }
}
