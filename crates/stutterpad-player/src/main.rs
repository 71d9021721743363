//! Stutterpad player - headless pad sampler with stutter effects
//!
//! Starts the audio engine and drives it from a line-based stdin prompt.
//! Sample decoding happens here on the control thread; the audio thread
//! only ever receives pre-decoded buffers through the command queue.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use stutterpad_core::audio::{get_output_devices, start_audio_system, AudioSystemResult};
use stutterpad_core::config::{load_config, save_config, settings_path, EngineSettings};
use stutterpad_core::engine::{gc_handle, EngineCommand, StutterMode, Subdivision};
use stutterpad_core::sample_file::load_sample;
use stutterpad_core::types::NUM_PADS;
use stutterpad_core::Shared;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("Stutterpad player starting...");

    let settings: EngineSettings = load_config::<EngineSettings>(&settings_path()).sanitized();

    let mut audio = start_audio_system(&settings.audio)
        .context("Failed to start audio system")?;

    log::info!(
        "Audio running: {}Hz, {} frames (~{:.1}ms latency)",
        audio.sample_rate,
        audio.buffer_size,
        audio.latency_ms
    );

    // Push persisted settings into the engine
    send(&mut audio, EngineCommand::SetTempo { bpm: settings.tempo });
    send(&mut audio, EngineCommand::SetMasterVolume { volume: settings.master_volume });
    for pad in 0..NUM_PADS {
        send(&mut audio, EngineCommand::SetInterpolation {
            pad,
            method: settings.interpolation,
        });
    }

    println!("stutterpad-player ready. Type 'help' for commands.");

    let mut settings = settings;
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        let args: Vec<&str> = line.split_whitespace().collect();
        if args.is_empty() {
            continue;
        }

        match run_command(&args, &mut audio, &mut settings) {
            Ok(Action::Continue) => {}
            Ok(Action::Quit) => break,
            Err(e) => eprintln!("error: {:#}", e),
        }
    }

    log::info!("Shutting down");
    Ok(())
}

enum Action {
    Continue,
    Quit,
}

fn run_command(
    args: &[&str],
    audio: &mut AudioSystemResult,
    settings: &mut EngineSettings,
) -> Result<Action> {
    match args[0] {
        "help" => print_help(),
        "quit" | "exit" => return Ok(Action::Quit),

        "load" => {
            let pad = parse_pad(args.get(1))?;
            let path = args.get(2).ok_or_else(|| anyhow!("usage: load <pad> <file>"))?;
            let sample = load_sample(Path::new(path), audio.sample_rate)
                .with_context(|| format!("Failed to load {}", path))?;
            println!(
                "loaded {} frames ({:.2}s) onto pad {}",
                sample.len(),
                sample.duration_secs(),
                pad + 1
            );
            let sample = Shared::new(&gc_handle(), sample);
            send(audio, EngineCommand::LoadSample { pad, sample });
        }
        "unload" => {
            let pad = parse_pad(args.get(1))?;
            send(audio, EngineCommand::UnloadSample { pad });
        }

        "play" => send(audio, EngineCommand::Play { pad: parse_pad(args.get(1))? }),
        "stop" => send(audio, EngineCommand::Stop { pad: parse_pad(args.get(1))? }),
        "reset" => send(audio, EngineCommand::Reset { pad: parse_pad(args.get(1))? }),

        "pitch" => {
            let pad = parse_pad(args.get(1))?;
            let ratio: f64 = parse_value(args.get(2), "ratio")?;
            send(audio, EngineCommand::SetPitch { pad, ratio });
        }
        "vol" => {
            let pad = parse_pad(args.get(1))?;
            let gain: f32 = parse_value(args.get(2), "gain")?;
            send(audio, EngineCommand::SetVolume { pad, gain });
        }
        "loop" => {
            let pad = parse_pad(args.get(1))?;
            let enabled = match args.get(2).copied() {
                Some("on") => true,
                Some("off") => false,
                _ => bail!("usage: loop <pad> on|off"),
            };
            send(audio, EngineCommand::SetLoop { pad, enabled });
        }
        "trim" => {
            let pad = parse_pad(args.get(1))?;
            let start: usize = parse_value(args.get(2), "start frame")?;
            let end: usize = parse_value(args.get(3), "end frame")?;
            // Widen the region first so neither new bound clamps against
            // the stale one when the new region is disjoint from the old.
            send(audio, EngineCommand::SetStart { pad, frame: 0 });
            send(audio, EngineCommand::SetEnd { pad, frame: end });
            send(audio, EngineCommand::SetStart { pad, frame: start });
        }
        "interp" => {
            let pad = parse_pad(args.get(1))?;
            let method = match args.get(2).copied() {
                Some("linear") => stutterpad_core::dsp::InterpolationMethod::Linear,
                Some("cubic") => stutterpad_core::dsp::InterpolationMethod::Cubic,
                _ => bail!("usage: interp <pad> linear|cubic"),
            };
            send(audio, EngineCommand::SetInterpolation { pad, method });
        }

        "master" => {
            let volume: f32 = parse_value(args.get(1), "volume")?;
            settings.master_volume = volume.clamp(0.0, 1.0);
            send(audio, EngineCommand::SetMasterVolume { volume });
        }
        "tempo" => {
            let bpm: f64 = parse_value(args.get(1), "bpm")?;
            settings.tempo = bpm;
            send(audio, EngineCommand::SetTempo { bpm });
        }

        "stutter" => {
            let mode = parse_mode(args.get(1))?;
            let subdivision = parse_subdivision(args.get(2))?;
            send(audio, EngineCommand::StutterStart { mode, subdivision });
        }
        "stutterstop" => send(audio, EngineCommand::StutterStop),

        "status" => print_status(audio),
        "devices" => match get_output_devices() {
            Ok(devices) => {
                for device in devices {
                    println!("  {}", device);
                }
            }
            Err(e) => eprintln!("error: {}", e),
        },
        "save" => {
            save_config(settings, &settings_path())?;
            println!("settings saved to {:?}", settings_path());
        }

        other => bail!("unknown command '{}', try 'help'", other),
    }
    Ok(Action::Continue)
}

/// Send a command, warning if the audio thread is not keeping up
fn send(audio: &mut AudioSystemResult, command: EngineCommand) {
    if let Err(rejected) = audio.command_sender.send(command) {
        log::warn!("Command queue full, dropped {:?}", rejected);
    }
}

/// Parse a 1-based pad number into a 0-based index
fn parse_pad(arg: Option<&&str>) -> Result<usize> {
    let n: usize = parse_value(arg, "pad")?;
    if n == 0 || n > NUM_PADS {
        bail!("pad must be 1-{}", NUM_PADS);
    }
    Ok(n - 1)
}

fn parse_value<T: std::str::FromStr>(arg: Option<&&str>, what: &str) -> Result<T> {
    arg.ok_or_else(|| anyhow!("missing {}", what))?
        .parse()
        .map_err(|_| anyhow!("invalid {}", what))
}

fn parse_mode(arg: Option<&&str>) -> Result<StutterMode> {
    match arg.copied() {
        Some("classic") => Ok(StutterMode::Classic),
        Some("gate") => Ok(StutterMode::Gate),
        Some("reverse") => Ok(StutterMode::Reverse),
        Some("wobble") => Ok(StutterMode::PitchWobble),
        _ => bail!("mode must be classic|gate|reverse|wobble"),
    }
}

fn parse_subdivision(arg: Option<&&str>) -> Result<Subdivision> {
    match arg.copied() {
        Some("16") => Ok(Subdivision::Sixteenth),
        Some("8") => Ok(Subdivision::Eighth),
        Some("4") => Ok(Subdivision::Quarter),
        Some("2") => Ok(Subdivision::Half),
        _ => bail!("subdivision must be 16|8|4|2 (note value)"),
    }
}

fn print_status(audio: &AudioSystemResult) {
    for (i, pad) in audio.pad_atomics.iter().enumerate() {
        if !pad.is_loaded() {
            println!("pad {}: empty", i + 1);
            continue;
        }
        println!(
            "pad {}: {:?} at {}/{}",
            i + 1,
            pad.play_state(),
            pad.position(),
            pad.length()
        );
    }
    let stutter = &audio.stutter_atomics;
    if stutter.is_active() {
        let phase = if stutter.is_capturing() { "capturing" } else { "looping" };
        println!("stutter: {:?} ({})", stutter.mode(), phase);
    } else {
        println!("stutter: off");
    }
}

fn print_help() {
    println!(
        "commands:\n\
         \x20 load <pad> <file>      decode a file onto a pad (1-{pads})\n\
         \x20 unload <pad>           clear a pad\n\
         \x20 play|stop|reset <pad>  transport\n\
         \x20 pitch <pad> <ratio>    0.25-4.0\n\
         \x20 vol <pad> <gain>       0.0-1.0\n\
         \x20 loop <pad> on|off      loop playback\n\
         \x20 trim <pad> <s> <e>     trim region in frames\n\
         \x20 interp <pad> linear|cubic\n\
         \x20 master <vol>           master volume\n\
         \x20 tempo <bpm>            30-200\n\
         \x20 stutter <mode> <sub>   classic|gate|reverse|wobble, 16|8|4|2\n\
         \x20 stutterstop            release the stutter\n\
         \x20 status                 pad and stutter state\n\
         \x20 devices                list audio outputs\n\
         \x20 save                   persist settings\n\
         \x20 quit",
        pads = NUM_PADS
    );
}
