//! Presentation feedback — pure derivation of overlay text from events.
//!
//! Nothing here feeds back into the decision logic; the overlay is a
//! function of the latest event and a fixed display duration.

use crate::events::{DenialReason, Event};
use std::time::{Duration, Instant};

/// Overlay color tone, left to the renderer to map to actual colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Granted,
    Denied,
    Pending,
}

#[derive(Debug, Clone)]
pub struct Overlay {
    pub text: String,
    pub tone: Tone,
    pub until: Instant,
}

impl Overlay {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.until
    }
}

/// Derive the overlay for an event, if the event warrants one.
pub fn overlay_for(event: &Event, now: Instant, display: Duration) -> Option<Overlay> {
    let (text, tone) = match event {
        Event::Accepted {
            display_name,
            action,
            ..
        } => (format!("Access granted: {display_name} ({action})"), Tone::Granted),
        // Backend trouble and a genuine denial read the same on screen;
        // logs carry the distinction.
        Event::Denied { .. } => ("Access denied".to_string(), Tone::Denied),
        Event::Escalated => (
            "Not recognized — enter your access code".to_string(),
            Tone::Pending,
        ),
        Event::Resolved { identity: None } => ("Access denied".to_string(), Tone::Denied),
        // A successful resolution is announced by the Accepted event that
        // accompanies it.
        Event::Resolved { identity: Some(_) } => return None,
    };

    Some(Overlay {
        text,
        tone,
        until: now + display,
    })
}
