#![cfg(not(target_arch = "wasm32"))]

use std::backtrace::Backtrace;
use std::fs::File;
use std::io::Write;
use std::panic;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::{info, warn, LevelFilter};

use drop_sandbox::audio::{AudioVoice, HitSoundDispatcher, SilentVoice};
use drop_sandbox::{ControlSurface, HeadlessScene, ManualClock, Sandbox, SandboxConfig, SceneGraph};

/// Headless drop sandbox: random spheres and boxes fall onto the floor.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// JSON config file; defaults apply when omitted
    config: Option<PathBuf>,

    /// Frames to simulate at the fixed step rate
    #[clap(long, default_value_t = 600)]
    frames: u32,

    /// Spawn a random object every N frames (0 disables spawning)
    #[clap(long, default_value_t = 30)]
    spawn_every: u32,

    /// Seed for the spawn generator
    #[clap(long)]
    seed: Option<u64>,

    /// Hit sound clip (needs the `rodio` feature)
    #[clap(long)]
    sound: Option<String>,
}

fn main() -> anyhow::Result<()> {
    setup_diagnostics();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SandboxConfig::from_json_file(path).with_context(|| format!("config {}", path.display()))?,
        None => SandboxConfig::default(),
    };
    info!("Starting drop sandbox (headless, {} frames)...", args.frames);

    let hit_sounds = HitSoundDispatcher::with_voices(config.hit_sound, || Ok(make_voice(args.sound.as_deref())))?;
    let fixed_dt = config.step.fixed_dt as f64;
    let mut sandbox = Sandbox::new(config, HeadlessScene::new(), hit_sounds)?;
    let mut controls = match args.seed {
        Some(seed) => ControlSurface::seeded(seed),
        None => ControlSurface::from_entropy(),
    };

    let clock = ManualClock::new();
    let mut sounds = 0;
    for frame in 0..args.frames {
        if args.spawn_every > 0 && frame % args.spawn_every == 0 {
            let command = controls.random_spawn();
            if let Err(err) = sandbox.apply(command) {
                warn!("{command:?} rejected: {err}");
            }
        }
        clock.advance(fixed_dt);
        let report = sandbox.tick_clock(&clock);
        sounds += report.sounds;
        if report.sounds > 0 {
            info!("frame {frame}: {} hit sound(s)", report.sounds);
        }
    }

    let asleep = sandbox.world().bodies().filter(|(_, body)| body.is_sleeping()).count();
    info!(
        "simulated {:.1}s: {} object(s), {} asleep, {} hit sound(s)",
        sandbox.world().time(),
        sandbox.registry().len(),
        asleep,
        sounds
    );

    let teardown = sandbox.reset();
    info!(
        "after reset: {} body(ies), {} proxy(ies) ({} pair(s) torn down)",
        sandbox.world().body_count(),
        sandbox.scene().proxy_count(),
        teardown.pairs
    );
    Ok(())
}

#[cfg(feature = "rodio")]
fn make_voice(clip: Option<&str>) -> Box<dyn AudioVoice> {
    let Some(path) = clip else {
        return Box::new(SilentVoice);
    };
    match drop_sandbox::RodioVoice::from_file(path) {
        Ok(voice) => Box::new(voice),
        Err(err) => {
            warn!("hit sounds disabled, could not open {path}: {err}");
            Box::new(SilentVoice)
        }
    }
}

#[cfg(not(feature = "rodio"))]
fn make_voice(clip: Option<&str>) -> Box<dyn AudioVoice> {
    if let Some(path) = clip {
        warn!("built without the `rodio` feature, ignoring {path}");
    }
    Box::new(SilentVoice)
}

/// Sets up logging and crash reports
fn setup_diagnostics() {
    env_logger::Builder::new()
        .filter_level(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .format_timestamp_millis()
        .format_target(false)
        .parse_default_env()
        .init();

    panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();

        let msg = match panic_info.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<dyn Any>",
            },
        };

        let location = panic_info.location().map_or("Unknown location".to_string(), |loc| {
            format!("{}:{}", loc.file(), loc.line())
        });

        let crash_msg = format!(
            "=== SANDBOX CRASH ===\nReason: {}\nLocation: {}\n\nStack Trace:\n{}",
            msg, location, backtrace
        );
        eprintln!("\x1b[31;1m{}\x1b[0m", crash_msg);

        if let Ok(mut file) = File::create("sandbox_crash.log") {
            let _ = file.write_all(crash_msg.as_bytes());
            eprintln!("Crash report saved to sandbox_crash.log");
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["drop_sandbox"]).unwrap();
        assert!(args.config.is_none());
        assert_eq!(args.frames, 600);
        assert_eq!(args.spawn_every, 30);
        assert!(args.seed.is_none() && args.sound.is_none());
    }

    #[test]
    fn test_args_flags_and_config_path() {
        let args = Args::try_parse_from([
            "drop_sandbox", "scene.json", "--frames", "120", "--spawn-every", "0", "--seed", "7", "--sound", "hit.mp3",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("scene.json")));
        assert_eq!((args.frames, args.spawn_every, args.seed), (120, 0, Some(7)));
        assert_eq!(args.sound.as_deref(), Some("hit.mp3"));
        assert!(Args::try_parse_from(["drop_sandbox", "--frames", "many"]).is_err());
    }
}
