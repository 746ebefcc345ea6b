//! Per-tick orchestration: liveness gating, matching, debounced toggles,
//! escalation and render state.
//!
//! `tick` runs to completion on every call and never blocks on I/O; the
//! worker thread owns all backend traffic. Per-tick analyzer failures
//! downgrade the tick to "no faces observed" instead of stopping the
//! loop.

use crate::cooldown::CooldownTable;
use crate::escalate::{Presence, UnknownEscalation};
use crate::events::{DenialReason, Event};
use crate::feedback::{overlay_for, Overlay};
use crate::sampler::Sampled;
use crate::worker::WorkerHandle;
use passage_core::{
    BoundingBox, FaceAnalyzer, Gallery, LivenessGate, LivenessScorer, LivenessVerdict,
    MatchOutcome, NearestMatcher,
};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Tunable pipeline parameters, all deployment calibration.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Maximum encoding distance accepted as a match.
    pub tolerance: f32,
    /// Liveness score threshold; lower is more permissive.
    pub liveness_threshold: f32,
    /// Minimum gap between attendance actions for one identity.
    pub cooldown: Duration,
    /// Continuous unknown presence before the fallback flow fires.
    pub unknown_timeout: Duration,
    /// How long overlay feedback stays on screen.
    pub display_duration: Duration,
}

/// Render tone for one face box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxTone {
    /// Recognized and live.
    Match,
    /// Live but not recognized.
    NoMatch,
    /// Failed the liveness gate.
    Spoof,
}

/// A face box in source-frame coordinates, ready to draw.
#[derive(Debug, Clone)]
pub struct RenderBox {
    pub bbox: BoundingBox,
    pub tone: BoxTone,
}

/// Everything one tick produces for the presentation layer.
pub struct TickOutput {
    pub events: Vec<Event>,
    pub boxes: Vec<RenderBox>,
    pub overlay: Option<Overlay>,
}

pub struct Pipeline<A, S> {
    gallery: Gallery,
    matcher: NearestMatcher,
    gate: LivenessGate,
    analyzer: A,
    scorer: S,
    cooldown: CooldownTable,
    escalation: UnknownEscalation,
    worker: WorkerHandle,
    worker_events: mpsc::UnboundedReceiver<Event>,
    boxes: Vec<RenderBox>,
    overlay: Option<Overlay>,
    display_duration: Duration,
}

impl<A: FaceAnalyzer, S: LivenessScorer> Pipeline<A, S> {
    pub fn new(
        gallery: Gallery,
        analyzer: A,
        scorer: S,
        worker: WorkerHandle,
        worker_events: mpsc::UnboundedReceiver<Event>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            gallery,
            matcher: NearestMatcher::new(config.tolerance),
            gate: LivenessGate::new(config.liveness_threshold),
            analyzer,
            scorer,
            cooldown: CooldownTable::new(config.cooldown),
            escalation: UnknownEscalation::new(config.unknown_timeout),
            worker,
            worker_events,
            boxes: Vec::new(),
            overlay: None,
            display_duration: config.display_duration,
        }
    }

    pub fn is_escalated(&self) -> bool {
        self.escalation.is_escalated()
    }

    /// Hand a fallback (identifier, code) pair to the worker. Ignored
    /// unless the escalation flow is currently active.
    pub fn submit_fallback(&self, identifier: String, code: String) -> bool {
        if !self.escalation.is_escalated() {
            tracing::debug!("fallback input ignored — no escalation in progress");
            return false;
        }
        self.worker.submit_fallback(identifier, code)
    }

    pub fn tick(&mut self, sampled: Sampled, now: Instant) -> TickOutput {
        let mut events = Vec::new();

        // Drain worker outcomes first so a fallback resolution resets the
        // state machine before this tick's presence is classified.
        while let Ok(event) = self.worker_events.try_recv() {
            if matches!(event, Event::Resolved { .. }) {
                self.escalation.resolve();
            }
            self.apply_overlay(&event, now);
            events.push(event);
        }

        if let Sampled::Processed {
            frame,
            detect,
            scale,
        } = sampled
        {
            let faces = match self.analyzer.analyze(&detect) {
                Ok(faces) => faces,
                Err(err) => {
                    tracing::warn!(error = %err, "analyzer failed — treating tick as faceless");
                    Vec::new()
                }
            };

            let full = frame.to_image();
            let inverse_scale = 1.0 / scale;
            let present = !faces.is_empty();
            let mut any_recognized_live = false;
            let mut any_spoof = false;
            let mut boxes = Vec::with_capacity(faces.len());

            for face in faces {
                let bbox = face.bbox.scaled(inverse_scale);

                let verdict = match bbox.crop_from(&full) {
                    Some(crop) => self.gate.assess(&mut self.scorer, &crop),
                    // Degenerate box after rescale — nothing to score.
                    None => LivenessVerdict::Unavailable,
                };

                if !verdict.is_live() {
                    any_spoof |= matches!(verdict, LivenessVerdict::Spoof { .. });
                    boxes.push(RenderBox {
                        bbox,
                        tone: BoxTone::Spoof,
                    });
                    continue;
                }

                match self.matcher.best_match(&face.encoding, &self.gallery) {
                    MatchOutcome::Known { identity, distance } => {
                        any_recognized_live = true;
                        tracing::debug!(%identity, distance, "face matched");
                        if self.cooldown.ready(&identity, now)
                            && self.worker.request_toggle(identity.clone())
                        {
                            self.cooldown.touch(&identity, now);
                        }
                        boxes.push(RenderBox {
                            bbox,
                            tone: BoxTone::Match,
                        });
                    }
                    MatchOutcome::Unknown { best_distance } => {
                        tracing::debug!(?best_distance, "face not recognized");
                        boxes.push(RenderBox {
                            bbox,
                            tone: BoxTone::NoMatch,
                        });
                    }
                }
            }

            // Surface spoof denials, debounced by the visible overlay so a
            // held-up photo produces one event per display period rather
            // than one per processed tick.
            if any_spoof && !any_recognized_live {
                let show = self.overlay.as_ref().map_or(true, |o| o.is_expired(now));
                if show {
                    let event = Event::Denied {
                        reason: DenialReason::Spoof,
                    };
                    self.apply_overlay(&event, now);
                    events.push(event);
                }
            }

            let presence = if !present {
                Presence::NoFaces
            } else if any_recognized_live {
                Presence::RecognizedLive
            } else {
                Presence::UnrecognizedOnly
            };

            if self.escalation.observe(presence, now) {
                let event = Event::Escalated;
                self.apply_overlay(&event, now);
                events.push(event);
            }

            self.boxes = boxes;
        }
        // Skipped ticks keep the previous boxes so the presentation stays
        // stable between processed frames.

        if self.overlay.as_ref().is_some_and(|o| o.is_expired(now)) {
            self.overlay = None;
        }

        TickOutput {
            events,
            boxes: self.boxes.clone(),
            overlay: self.overlay.clone(),
        }
    }

    fn apply_overlay(&mut self, event: &Event, now: Instant) {
        if let Some(overlay) = overlay_for(event, now, self.display_duration) {
            self.overlay = Some(overlay);
        }
    }
}
