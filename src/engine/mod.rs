//! Engine module housing the reusable training core.
//!
//! This module exposes trait-based backends (`backend`) and the `EngineHandle`
//! orchestration layer (`core`) shared by the CLI and any other front-end.

pub mod backend;
pub mod core;

#[cfg(feature = "desktop_audio")]
pub use backend::CpalBackend;
pub use backend::{
    default_backend, AudioBackend, CaptureCallback, StubBackend, StubSinger, StubTimeSource,
    SystemTimeSource, TimeSource,
};
pub use core::{EngineHandle, RunReport};
