//! Real-time playback engine
//!
//! The engine runs inside the audio callback. The control thread talks
//! to it exclusively through the command ring buffer and reads state
//! back through lock-free atomics.

pub mod command;
#[allow(clippy::module_inception)]
pub mod engine;
pub mod gc;
pub mod player;
pub mod stutter;

pub use command::{command_channel, CommandSender, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use engine::{AudioEngine, DEFAULT_TEMPO, MAX_BLOCK_SIZE, MAX_TEMPO, MIN_TEMPO};
pub use gc::gc_handle;
pub use player::{PadAtomics, SamplePlayer};
pub use stutter::{StutterAtomics, StutterMode, StutterProcessor, Subdivision};
