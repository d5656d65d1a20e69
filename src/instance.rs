//! Identity registry shared by every system that hands out object ids.
//!
//! The registry is an explicit service object: create it at process start, pass it
//! (usually as an `Arc`) to whatever needs ids, and drain it at shutdown. Asset
//! loading threads may register and release concurrently with the render thread;
//! one mutex guards the identity table.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Non-zero object identity. Zero is never assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u32);

impl InstanceId {
    pub const INVALID: Self = Self(0);

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstanceError {
    #[error("all {0} instance ids are in use")]
    MaxIdsExceeded(u32),
    #[error("instance id {0} not found")]
    NotFound(InstanceId),
}

struct RegistryState {
    entries: HashMap<InstanceId, String>,
    next: u32,
}

pub struct InstanceRegistry {
    state: Mutex<RegistryState>,
    capacity: u32,
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::with_capacity(u32::MAX)
    }

    /// Registry that hands out at most `capacity` simultaneous ids.
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                entries: HashMap::new(),
                next: 1,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Assign a fresh id to an object described by `label`.
    pub fn assign(&self, label: impl Into<String>) -> Result<InstanceId, InstanceError> {
        let mut state = self.state.lock();
        if state.entries.len() >= self.capacity as usize {
            return Err(InstanceError::MaxIdsExceeded(self.capacity));
        }

        // Fewer than `capacity` ids are taken, so this finds a free one
        let id = loop {
            let candidate = InstanceId(state.next);
            state.next = if state.next >= self.capacity { 1 } else { state.next + 1 };
            if !state.entries.contains_key(&candidate) {
                break candidate;
            }
        };

        let label = label.into();
        log::debug!("Assigned ID {} to {}", id, label);
        state.entries.insert(id, label);
        Ok(id)
    }

    /// Release ids. Zero is skipped; unknown ids are reported and ignored.
    pub fn release(&self, ids: &[InstanceId]) {
        let mut state = self.state.lock();
        for id in ids.iter().filter(|id| id.is_valid()) {
            if state.entries.remove(id).is_none() {
                log::error!("Attempted to release unknown instance {}", id);
            }
        }
    }

    /// Release every id, returning how many were still held.
    pub fn release_all(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.entries.len();
        state.entries.clear();
        state.next = 1;
        count
    }

    pub fn get(&self, id: InstanceId) -> Result<String, InstanceError> {
        self.state
            .lock()
            .entries
            .get(&id)
            .cloned()
            .ok_or(InstanceError::NotFound(id))
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn assign_never_hands_out_zero() {
        let registry = InstanceRegistry::new();
        let id = registry.assign("camera").unwrap();
        assert!(id.is_valid());
        assert_eq!(registry.get(id).unwrap(), "camera");
    }

    #[test]
    fn release_skips_zero_and_unknown_ids() {
        let registry = InstanceRegistry::new();
        let id = registry.assign("a").unwrap();
        registry.release(&[InstanceId::INVALID, InstanceId(999), id]);
        assert!(registry.is_empty());
        assert_eq!(registry.get(id), Err(InstanceError::NotFound(id)));
    }

    #[test]
    fn exhausted_registry_reports_error_and_recovers() {
        let registry = InstanceRegistry::with_capacity(2);
        let first = registry.assign("a").unwrap();
        let _second = registry.assign("b").unwrap();
        assert_eq!(registry.assign("c"), Err(InstanceError::MaxIdsExceeded(2)));

        registry.release(&[first]);
        let reused = registry.assign("c").unwrap();
        assert_eq!(reused, first);
    }

    #[test]
    fn allocation_skips_occupied_ids_after_wrap() {
        let registry = InstanceRegistry::with_capacity(3);
        let a = registry.assign("a").unwrap();
        let b = registry.assign("b").unwrap();
        let c = registry.assign("c").unwrap();
        registry.release(&[b]);
        // the cursor wrapped to 1, which is still held by `a`
        assert_eq!(registry.assign("d").unwrap(), b);
        assert_ne!(a, c);
    }

    #[test]
    fn concurrent_assignment_yields_unique_ids() {
        let registry = InstanceRegistry::new();
        let ids: Vec<InstanceId> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|worker| {
                    let registry = &registry;
                    scope.spawn(move || {
                        (0..250)
                            .map(|i| registry.assign(format!("asset {}-{}", worker, i)).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        let unique: HashSet<_> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 1000);
        assert_eq!(registry.release_all(), 1000);
    }

    #[test]
    fn id_displays_as_hex() {
        assert_eq!(InstanceId(0x2A).to_string(), "0000002A");
    }
}
