//! Per-identity attendance debounce.
//!
//! A lingering face in front of the camera must produce one attendance
//! transition, not one per processed tick. The table is owned exclusively
//! by the tick loop, never touched by the worker, and is reset on restart.

use passage_core::IdentityId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct CooldownTable {
    last_action: HashMap<IdentityId, Instant>,
    window: Duration,
}

impl CooldownTable {
    pub fn new(window: Duration) -> Self {
        Self {
            last_action: HashMap::new(),
            window,
        }
    }

    /// Whether a toggle for this identity may fire at `now`.
    pub fn ready(&self, identity: &IdentityId, now: Instant) -> bool {
        match self.last_action.get(identity) {
            Some(&last) => now.duration_since(last) > self.window,
            None => true,
        }
    }

    /// Record an action. Stamped when the toggle request is enqueued,
    /// regardless of whether the backend write later succeeds, so a
    /// failing backend is probed at most once per window per identity.
    pub fn touch(&mut self, identity: &IdentityId, now: Instant) {
        self.last_action.insert(identity.clone(), now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_identity_is_ready() {
        let table = CooldownTable::new(Duration::from_secs(10));
        assert!(table.ready(&IdentityId::from("u1"), Instant::now()));
    }

    #[test]
    fn test_suppressed_within_window() {
        let mut table = CooldownTable::new(Duration::from_secs(10));
        let id = IdentityId::from("u1");
        let t0 = Instant::now();

        table.touch(&id, t0);
        assert!(!table.ready(&id, t0 + Duration::from_secs(5)));
        assert!(!table.ready(&id, t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_ready_after_window() {
        let mut table = CooldownTable::new(Duration::from_secs(10));
        let id = IdentityId::from("u1");
        let t0 = Instant::now();

        table.touch(&id, t0);
        assert!(table.ready(&id, t0 + Duration::from_secs(11)));
    }

    #[test]
    fn test_identities_independent() {
        let mut table = CooldownTable::new(Duration::from_secs(10));
        let t0 = Instant::now();

        table.touch(&IdentityId::from("u1"), t0);
        assert!(table.ready(&IdentityId::from("u2"), t0));
    }

    #[test]
    fn test_exactly_one_transition_in_window() {
        // Two attempts within the window: only the first passes the gate.
        let mut table = CooldownTable::new(Duration::from_secs(10));
        let id = IdentityId::from("u1");
        let t0 = Instant::now();

        let mut applied = 0;
        for offset in [0u64, 3] {
            let now = t0 + Duration::from_secs(offset);
            if table.ready(&id, now) {
                table.touch(&id, now);
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }
}
