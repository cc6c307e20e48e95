// src/audio.rs
//! Hit sounds: the audio collaborator seam and the collision dispatcher.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::HitSoundConfig;
use crate::events::CollisionEvent;
use crate::{Error, Result};

// --- Public API ---

/// One playback resource. `play` is fire-and-forget; the core never asks
/// whether anything is still playing.
pub trait AudioVoice {
    /// Moves the playback position back to the start of the clip.
    fn rewind(&mut self);
    /// Starts playback at `volume` in [0, 1].
    fn play(&mut self, volume: f32) -> Result<()>;
}

/// Used when no audio device or clip is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentVoice;

impl AudioVoice for SilentVoice {
    fn rewind(&mut self) {}

    fn play(&mut self, _volume: f32) -> Result<()> {
        Ok(())
    }
}

/// Records every play. Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingVoice {
    volumes: Arc<Mutex<Vec<f32>>>,
    rewinds: Arc<Mutex<usize>>,
    failing: bool,
}

impl RecordingVoice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A voice whose every `play` fails, like a lost output device.
    pub fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    pub fn volumes(&self) -> Vec<f32> {
        self.volumes.lock().clone()
    }

    pub fn play_count(&self) -> usize {
        self.volumes.lock().len()
    }

    pub fn rewind_count(&self) -> usize {
        *self.rewinds.lock()
    }
}

impl AudioVoice for RecordingVoice {
    fn rewind(&mut self) {
        *self.rewinds.lock() += 1;
    }

    fn play(&mut self, volume: f32) -> Result<()> {
        if self.failing {
            return Err(Error::audio("output device unavailable"));
        }
        self.volumes.lock().push(volume);
        Ok(())
    }
}

/// Round-robin over several voices so hits in the same tick overlap instead
/// of cutting each other off. Deviates from the single shared voice; only
/// used when more than one voice is configured.
pub struct VoicePool {
    voices: Vec<Box<dyn AudioVoice>>,
    next: usize,
}

impl VoicePool {
    pub fn new(voices: Vec<Box<dyn AudioVoice>>) -> Result<Self> {
        if voices.is_empty() {
            return Err(Error::config("voice pool needs at least one voice"));
        }
        Ok(Self { voices, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

impl AudioVoice for VoicePool {
    fn rewind(&mut self) {
        self.voices[self.next].rewind();
    }

    fn play(&mut self, volume: f32) -> Result<()> {
        let current = self.next;
        self.next = (self.next + 1) % self.voices.len();
        self.voices[current].play(volume)
    }
}

/// Playback volume for an impact, or `None` if it is too soft to hear.
///
/// `floor(speed) / divisor`, clamped to [0, 1]. Speeds at or below
/// `min_impact_speed` are gated out.
#[inline]
pub fn hit_volume(impact_speed: f32, min_impact_speed: f32, volume_divisor: f32) -> Option<f32> {
    if !impact_speed.is_finite() || impact_speed <= min_impact_speed {
        return None;
    }
    Some((impact_speed.floor() / volume_divisor).clamp(0.0, 1.0))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: u64,
    pub gated: u64,
    pub throttled: u64,
    pub played: u64,
    pub failed: u64,
}

/// Turns collision events into hit sounds on one voice (or pool).
pub struct HitSoundDispatcher {
    voice: Box<dyn AudioVoice>,
    config: HitSoundConfig,
    last_played: Option<f64>,
    stats: DispatchStats,
}

impl HitSoundDispatcher {
    pub fn new(voice: Box<dyn AudioVoice>, config: HitSoundConfig) -> Self {
        Self { voice, config, last_played: None, stats: DispatchStats::default() }
    }

    /// Builds `config.voices` voices with `make_voice`; one voice skips the pool.
    pub fn with_voices<F>(config: HitSoundConfig, mut make_voice: F) -> Result<Self>
    where
        F: FnMut() -> Result<Box<dyn AudioVoice>>,
    {
        let voice: Box<dyn AudioVoice> = if config.voices <= 1 {
            make_voice()?
        } else {
            let voices = (0..config.voices).map(|_| make_voice()).collect::<Result<Vec<_>>>()?;
            log::info!("hit sounds use a pool of {} voices", voices.len());
            Box::new(VoicePool::new(voices)?)
        };
        Ok(Self::new(voice, config))
    }

    #[inline]
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    #[inline]
    pub fn config(&self) -> &HitSoundConfig {
        &self.config
    }

    /// Handles one collision at simulation time `now`. Returns the volume
    /// played, if any. Playback failures are logged and swallowed.
    pub fn on_collision(&mut self, event: &CollisionEvent, now: f64) -> Option<f32> {
        self.stats.received += 1;
        let speed = event.impact_speed();
        let Some(volume) = hit_volume(speed, self.config.min_impact_speed, self.config.volume_divisor) else {
            self.stats.gated += 1;
            return None;
        };

        if self.config.cooldown > 0.0 {
            if let Some(last) = self.last_played {
                if now - last < self.config.cooldown as f64 {
                    self.stats.throttled += 1;
                    return None;
                }
            }
        }

        self.voice.rewind();
        match self.voice.play(volume) {
            Ok(()) => {
                self.stats.played += 1;
                self.last_played = Some(now);
                log::trace!("hit at {:.2} m/s, volume {:.1}", speed, volume);
                Some(volume)
            }
            Err(err) => {
                self.stats.failed += 1;
                log::warn!("hit sound skipped: {err}");
                None
            }
        }
    }
}
