// src/core/gate.rs
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared simulate/live switch. Defaults to simulate; every order and
/// withdrawal path reads it at the moment of submission, so a toggle applies
/// to the next attempted action, never retroactively.
pub struct SafetyGate {
    live: AtomicBool,
}

impl SafetyGate {
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(false),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn set_live(&self, enabled: bool) {
        self.live.store(enabled, Ordering::SeqCst);
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new()
    }
}
