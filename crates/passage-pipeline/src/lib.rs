//! passage-pipeline — The real-time identity-verification loop.
//!
//! One `tick` samples a frame, gates detected faces on liveness, matches
//! them against the gallery, debounces attendance toggles per identity,
//! and runs the unknown-presence escalation state machine. All backend
//! I/O happens on a dedicated worker thread; the tick loop only enqueues
//! requests and drains events.

pub mod cooldown;
pub mod escalate;
pub mod events;
pub mod feedback;
pub mod frame;
pub mod pipeline;
pub mod sampler;
pub mod toggle;
pub mod worker;

pub use cooldown::CooldownTable;
pub use escalate::{Presence, UnknownEscalation};
pub use events::{AttendanceAction, DenialReason, Event};
pub use feedback::{Overlay, Tone};
pub use frame::{yuyv_to_rgb, CaptureError, Frame};
pub use pipeline::{BoxTone, Pipeline, PipelineConfig, RenderBox, TickOutput};
pub use sampler::{FrameSampler, FrameSource, Sampled};
pub use toggle::{next_action, AttendanceRecord};
pub use worker::{spawn_worker, AttendanceBackend, BackendError, WorkerHandle};
