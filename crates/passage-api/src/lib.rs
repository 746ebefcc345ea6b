//! Blocking client for the attendance backend's REST API.
//!
//! Every call here blocks on the network, so nothing in this crate may
//! run on the capture/tick path; the attendance worker thread and the
//! CLI are the only consumers.

pub mod client;
pub mod wire;

pub use client::{ApiClient, ApiError};
pub use wire::{
    AttendanceWire, EncodingRecord, UserDetails, UserPhoto, VerifyCodeResponse,
};
