//! Control-thread to audio-thread command protocol
//!
//! Commands flow through a lock-free SPSC ring buffer. The audio thread
//! drains the queue at the start of every block, so every command is a
//! small, self-contained value; anything heavyweight (decoded sample
//! data) travels behind a `basedrop::Shared` pointer allocated on the
//! control thread.

use basedrop::Shared;

use crate::dsp::interp::InterpolationMethod;
use crate::engine::stutter::{StutterMode, Subdivision};
use crate::sample_file::LoadedSample;

/// Capacity of the command ring buffer.
///
/// Commands are drained every block (~5-10ms), so this only needs to
/// absorb short control-thread bursts.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Commands sent from the control thread to the audio engine
pub enum EngineCommand {
    // ─── Pad sample management ───
    LoadSample { pad: usize, sample: Shared<LoadedSample> },
    UnloadSample { pad: usize },

    // ─── Pad transport ───
    Play { pad: usize },
    Stop { pad: usize },
    Reset { pad: usize },

    // ─── Pad parameters ───
    SetStart { pad: usize, frame: usize },
    SetEnd { pad: usize, frame: usize },
    SetLoop { pad: usize, enabled: bool },
    SetVolume { pad: usize, gain: f32 },
    SetPitch { pad: usize, ratio: f64 },
    SetInterpolation { pad: usize, method: InterpolationMethod },

    // ─── Master bus ───
    SetMasterVolume { volume: f32 },
    SetTempo { bpm: f64 },
    StutterStart { mode: StutterMode, subdivision: Subdivision },
    StutterStop,
}

// Manual impl: `Shared` has no Debug, so LoadSample prints a summary
impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadSample { pad, sample } => f
                .debug_struct("LoadSample")
                .field("pad", pad)
                .field("frames", &sample.len())
                .finish(),
            Self::UnloadSample { pad } => f.debug_struct("UnloadSample").field("pad", pad).finish(),
            Self::Play { pad } => f.debug_struct("Play").field("pad", pad).finish(),
            Self::Stop { pad } => f.debug_struct("Stop").field("pad", pad).finish(),
            Self::Reset { pad } => f.debug_struct("Reset").field("pad", pad).finish(),
            Self::SetStart { pad, frame } => f
                .debug_struct("SetStart")
                .field("pad", pad)
                .field("frame", frame)
                .finish(),
            Self::SetEnd { pad, frame } => f
                .debug_struct("SetEnd")
                .field("pad", pad)
                .field("frame", frame)
                .finish(),
            Self::SetLoop { pad, enabled } => f
                .debug_struct("SetLoop")
                .field("pad", pad)
                .field("enabled", enabled)
                .finish(),
            Self::SetVolume { pad, gain } => f
                .debug_struct("SetVolume")
                .field("pad", pad)
                .field("gain", gain)
                .finish(),
            Self::SetPitch { pad, ratio } => f
                .debug_struct("SetPitch")
                .field("pad", pad)
                .field("ratio", ratio)
                .finish(),
            Self::SetInterpolation { pad, method } => f
                .debug_struct("SetInterpolation")
                .field("pad", pad)
                .field("method", method)
                .finish(),
            Self::SetMasterVolume { volume } => f
                .debug_struct("SetMasterVolume")
                .field("volume", volume)
                .finish(),
            Self::SetTempo { bpm } => f.debug_struct("SetTempo").field("bpm", bpm).finish(),
            Self::StutterStart { mode, subdivision } => f
                .debug_struct("StutterStart")
                .field("mode", mode)
                .field("subdivision", subdivision)
                .finish(),
            Self::StutterStop => write!(f, "StutterStop"),
        }
    }
}

/// Create the command channel pair.
///
/// The producer goes to the control thread, the consumer to the audio
/// callback.
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Control-thread handle for sending commands
pub struct CommandSender {
    producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    pub fn new(producer: rtrb::Producer<EngineCommand>) -> Self {
        Self { producer }
    }

    /// Send a command to the audio thread.
    ///
    /// Returns the command back if the queue is full so the caller can
    /// retry or drop it.
    pub fn send(&mut self, command: EngineCommand) -> Result<(), EngineCommand> {
        self.producer
            .push(command)
            .map_err(|rtrb::PushError::Full(value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_size_stays_small() {
        // Commands are copied through the ring buffer every control
        // gesture; keep them pointer-sized payloads
        let size = std::mem::size_of::<EngineCommand>();
        assert!(size <= 32, "EngineCommand is {} bytes", size);
    }

    #[test]
    fn test_channel_roundtrip() {
        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::Play { pad: 3 }).unwrap();
        tx.push(EngineCommand::SetTempo { bpm: 140.0 }).unwrap();

        assert!(matches!(rx.pop(), Ok(EngineCommand::Play { pad: 3 })));
        assert!(matches!(rx.pop(), Ok(EngineCommand::SetTempo { .. })));
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_sender_reports_full_queue() {
        let (tx, _rx) = command_channel();
        let mut sender = CommandSender::new(tx);

        for _ in 0..COMMAND_QUEUE_CAPACITY {
            sender.send(EngineCommand::StutterStop).unwrap();
        }
        let rejected = sender.send(EngineCommand::StutterStop);
        assert!(matches!(rejected, Err(EngineCommand::StutterStop)));
    }
}
