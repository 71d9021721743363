//! DSP primitives shared by the playback engine

pub mod envelope;
pub mod interp;

pub use envelope::{AdsrEnvelope, Envelope, EnvelopeState};
pub use interp::InterpolationMethod;
