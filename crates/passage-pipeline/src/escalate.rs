//! Unknown-presence escalation state machine.
//!
//! Tracks how long an unrecognized-but-present face has been continuously
//! in front of the camera and fires the fallback verification flow once
//! per continuous run. Any tick with a recognized live face or with no
//! faces at all resets the run.

use std::time::{Duration, Instant};

/// Summary of one processed tick, as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// No faces detected this tick.
    NoFaces,
    /// At least one face matched a gallery identity and passed liveness.
    RecognizedLive,
    /// Faces present, but none both matched and live.
    UnrecognizedOnly,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    Watching { since: Instant },
    Escalated,
}

pub struct UnknownEscalation {
    state: State,
    timeout: Duration,
}

impl UnknownEscalation {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: State::Idle,
            timeout,
        }
    }

    pub fn is_escalated(&self) -> bool {
        matches!(self.state, State::Escalated)
    }

    /// Feed one tick's presence summary. Returns `true` exactly when the
    /// escalation fires — at most once per continuous unrecognized run.
    pub fn observe(&mut self, presence: Presence, now: Instant) -> bool {
        match presence {
            Presence::NoFaces | Presence::RecognizedLive => {
                self.state = State::Idle;
                false
            }
            Presence::UnrecognizedOnly => match self.state {
                State::Idle => {
                    self.state = State::Watching { since: now };
                    false
                }
                State::Watching { since } => {
                    if now.duration_since(since) >= self.timeout {
                        self.state = State::Escalated;
                        true
                    } else {
                        false
                    }
                }
                State::Escalated => false,
            },
        }
    }

    /// The fallback flow finished; a fresh unrecognized run may escalate
    /// again.
    pub fn resolve(&mut self) {
        self.state = State::Idle;
    }
}
