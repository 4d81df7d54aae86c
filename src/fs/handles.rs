//! Open transcoders, keyed by the file handle the kernel hands back to us.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{Driver, lock};

pub type SharedDriver = Arc<Mutex<Box<dyn Driver>>>;

/// Handle ids start at 1; 0 means "no handle" (passthrough files).
pub struct HandleTable {
    next: AtomicU64,
    open: Mutex<HashMap<u64, SharedDriver>>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
            open: Mutex::new(HashMap::new()),
        }
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, driver: Box<dyn Driver>) -> u64 {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        lock(&self.open).insert(id, Arc::new(Mutex::new(driver)));
        id
    }

    pub fn get(&self, id: u64) -> Option<SharedDriver> {
        lock(&self.open).get(&id).cloned()
    }

    pub fn remove(&self, id: u64) -> Option<SharedDriver> {
        lock(&self.open).remove(&id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        lock(&self.open).len()
    }
}
