//! Engine module housing the tempo engine and its collaborators.
//!
//! `core` owns the calibration/detection state, `backend` defines where frames
//! and timestamps come from, and `driver` runs the periodic tick loop.

pub mod backend;
pub mod core;
pub mod driver;

#[cfg(feature = "live_input")]
pub use backend::CpalFrameSource;
pub use backend::{
    FrameSource, RingFrameSource, StubTimeSource, SyntheticConfig, SyntheticSource,
    SystemTimeSource, TimeSource, WavFrameSource,
};
pub use core::{EngineCommand, EngineEvent, EngineMode, TempoEngine, TickOutcome};
pub use driver::{run_until, TickDriver};
