//! Nearest-neighbor identity matching over the enrollment gallery.
//!
//! This is the only place identity decisions are made. The matcher has no
//! side effects and no state beyond its distance tolerance.

use crate::gallery::Gallery;
use crate::types::{Encoding, IdentityId};

/// Outcome of matching a probe encoding against the gallery.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// Closest entry was within tolerance.
    Known { identity: IdentityId, distance: f32 },
    /// No entry within tolerance. `best_distance` is `None` for an empty
    /// gallery.
    Unknown { best_distance: Option<f32> },
}

impl MatchOutcome {
    pub fn identity(&self) -> Option<&IdentityId> {
        match self {
            MatchOutcome::Known { identity, .. } => Some(identity),
            MatchOutcome::Unknown { .. } => None,
        }
    }
}

/// Euclidean nearest-neighbor matcher with a fixed acceptance tolerance.
///
/// Scans every gallery entry; the first index achieving the minimum
/// distance wins, so ties resolve deterministically by enrollment order
/// rather than by any map iteration order.
#[derive(Debug, Clone, Copy)]
pub struct NearestMatcher {
    pub tolerance: f32,
}

impl NearestMatcher {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn best_match(&self, probe: &Encoding, gallery: &Gallery) -> MatchOutcome {
        let mut best_distance = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, entry) in gallery.entries().iter().enumerate() {
            let d = probe.distance(&entry.encoding);
            if d < best_distance {
                best_distance = d;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_distance <= self.tolerance => MatchOutcome::Known {
                identity: gallery.entries()[idx].identity.clone(),
                distance: best_distance,
            },
            Some(_) => MatchOutcome::Unknown {
                best_distance: Some(best_distance),
            },
            None => MatchOutcome::Unknown {
                best_distance: None,
            },
        }
    }
}
