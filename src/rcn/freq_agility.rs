//! Background energy-sampling frequency-agility state machine
//! (`spec.md` §4.2).

use crate::frame::CHANNELS;
use core::time::Duration;

pub mod consts {
    use core::time::Duration;

    /// How long frequency agility is suspended after a full thrash-avoidance
    /// cycle.
    pub const SUSPEND_DURATION: Duration = Duration::from_secs(60);

    /// A channel visited for less than this long, across all channels, means
    /// we are thrashing and should suspend.
    pub const SHORT_DURATION_THRESHOLD: Duration = Duration::from_secs(60);

    /// Number of noisy samples (LQI over threshold) that triggers a channel
    /// migration.
    pub const NOISY_SAMPLE_THRESHOLD: u16 = 16;

    /// Minimum samples taken on a channel before migration is considered.
    pub const MIN_SAMPLES_BEFORE_ACTION: u16 = 32;

    /// LQI equivalent of -72 dBm: samples at or above this are "noisy".
    pub const NOISE_LQI_THRESHOLD: u8 = 80;
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreqAgilityAction {
    /// Stay on the current channel; not enough evidence yet.
    Continue,
    /// Migrate to the next allowed channel.
    Migrate { next_channel: u8 },
    /// All channels visited too briefly in a row: suspend for
    /// `consts::SUSPEND_DURATION` to avoid thrashing.
    Suspend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    Suspended,
}

/// Background energy-sampling state machine (`spec.md` §4.2).
pub struct FreqAgility {
    phase: Phase,
    current_channel_idx: usize,
    samples_on_channel: u16,
    noisy_samples_on_channel: u16,
    time_on_channel: Duration,
    short_visits_in_a_row: u8,
}

impl Default for FreqAgility {
    fn default() -> Self {
        Self {
            phase: Phase::Active,
            current_channel_idx: 0,
            samples_on_channel: 0,
            noisy_samples_on_channel: 0,
            time_on_channel: Duration::ZERO,
            short_visits_in_a_row: 0,
        }
    }
}

impl FreqAgility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_channel(&self) -> u8 {
        CHANNELS[self.current_channel_idx]
    }

    /// Record one LQI energy sample and the time elapsed since the previous
    /// sample; returns the action the caller (network layer) should take.
    pub fn sample(&mut self, lqi: u8, elapsed: Duration) -> FreqAgilityAction {
        if self.phase == Phase::Suspended {
            return FreqAgilityAction::Continue;
        }

        self.samples_on_channel += 1;
        self.time_on_channel += elapsed;
        if lqi >= consts::NOISE_LQI_THRESHOLD {
            self.noisy_samples_on_channel += 1;
        }

        let gated = self.samples_on_channel >= consts::MIN_SAMPLES_BEFORE_ACTION;
        let noisy = self.noisy_samples_on_channel >= consts::NOISY_SAMPLE_THRESHOLD;

        if gated && noisy {
            return self.migrate();
        }

        FreqAgilityAction::Continue
    }

    fn migrate(&mut self) -> FreqAgilityAction {
        if self.time_on_channel < consts::SHORT_DURATION_THRESHOLD {
            self.short_visits_in_a_row += 1;
        } else {
            self.short_visits_in_a_row = 0;
        }

        self.current_channel_idx = (self.current_channel_idx + 1) % CHANNELS.len();
        self.samples_on_channel = 0;
        self.noisy_samples_on_channel = 0;
        self.time_on_channel = Duration::ZERO;

        if self.short_visits_in_a_row as usize >= CHANNELS.len() {
            self.phase = Phase::Suspended;
            self.short_visits_in_a_row = 0;
            return FreqAgilityAction::Suspend;
        }

        FreqAgilityAction::Migrate {
            next_channel: self.current_channel(),
        }
    }

    /// Called by the timer service once `consts::SUSPEND_DURATION` has
    /// elapsed after a `Suspend` action.
    pub fn resume(&mut self) {
        self.phase = Phase::Active;
        self.samples_on_channel = 0;
        self.noisy_samples_on_channel = 0;
        self.time_on_channel = Duration::ZERO;
    }
}
