//! Records which requests handlers saw.

use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: &str) {
        self.seen.lock().unwrap().push(id.to_string());
    }

    pub fn ids(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn count_of(&self, id: &str) -> usize {
        self.seen.lock().unwrap().iter().filter(|s| *s == id).count()
    }
}
