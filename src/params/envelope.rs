//! Preview voice envelope timing.

use std::time::Duration;

/// Envelope windows for preview voices (seconds)
#[derive(Debug, Clone)]
pub struct EnvelopeConfig {
    /// Gain ramp 0 -> target when a voice starts
    pub attack_s: f64,

    /// Gain ramp current -> 0 when a held voice stops
    pub release_s: f64,

    /// Extra wait after a ramp before disposing nodes
    pub cleanup_margin_s: f64,

    /// Time a one-shot audition holds at full level after its attack
    pub one_shot_hold_s: f64,

    /// Linear fade to zero that ends a one-shot audition
    pub one_shot_fade_s: f64,

    /// Control rate of the wobble detune on preview voices
    pub modulation_interval_s: f64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack_s: 0.02,
            release_s: 0.25,
            cleanup_margin_s: 0.05,
            one_shot_hold_s: 0.3,
            one_shot_fade_s: 0.5,
            modulation_interval_s: 0.025, // 40 Hz
        }
    }
}

impl EnvelopeConfig {
    /// Delay from a stop request until disposal for a ramp of `ramp_s`
    pub fn disposal_delay(&self, ramp_s: f64) -> Duration {
        secs(ramp_s + self.cleanup_margin_s)
    }

    /// Delay from one-shot start until its fade begins
    pub fn one_shot_release_delay(&self) -> Duration {
        secs(self.attack_s + self.one_shot_hold_s)
    }

    pub fn modulation_interval(&self) -> Duration {
        secs(self.modulation_interval_s.max(0.001))
    }

    /// Total lifetime of a one-shot audition including cleanup
    pub fn one_shot_total(&self) -> Duration {
        self.one_shot_release_delay()
            .saturating_add(self.disposal_delay(self.one_shot_fade_s))
    }
}

/// Seconds to a `Duration`; negative or NaN is zero, overflow saturates
fn secs(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX)
}
