// Encoding engine: capability probing, stream inspection, command building, job running

pub mod core;
pub mod hardware;
pub mod probe;
pub mod worker;

pub use self::core::*;
pub use hardware::{Capabilities, VideoEncoder};
pub use probe::{AudioTrack, probe_audio_tracks};
pub use worker::{BatchCancel, BatchRunner, BatchSummary, JobRunner, RunnerError, wait_for_outcome};
