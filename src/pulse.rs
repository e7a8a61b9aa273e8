// FitNode: Pulse Detector
//
// Heart-rate extraction from a raw analog PPG stream.  A beat is the rising
// crossing of `threshold`.  The detector re-arms only once the signal has
// dropped below `threshold - hysteresis`, so noise riding on a single pulse
// does not register as several beats.  Beat-to-beat intervals outside the
// human range are discarded before they reach the moving average.

use crate::config::{PulseConfig, BPM_HISTORY_LEN};

/// Slots at or below this value are treated as empty.
const EMPTY_SLOT_BPM: f32 = 0.1;

/// Fixed-capacity ring of recent accepted BPM values.  Zero marks an empty
/// slot; the oldest slot is overwritten once the ring is full.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpmHistory {
    slots: [f32; BPM_HISTORY_LEN],
    index: usize,
}

impl BpmHistory {
    pub const fn new() -> Self {
        Self {
            slots: [0.0; BPM_HISTORY_LEN],
            index: 0,
        }
    }

    pub fn push(&mut self, bpm: f32) {
        self.slots[self.index] = bpm;
        self.index = (self.index + 1) % BPM_HISTORY_LEN;
    }

    /// Mean over non-empty slots, 0 when none are filled.
    pub fn average(&self) -> f32 {
        let (sum, count) = self
            .slots
            .iter()
            .filter(|&&bpm| bpm > EMPTY_SLOT_BPM)
            .fold((0.0f32, 0u32), |(sum, count), &bpm| (sum + bpm, count + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }

    #[cfg(test)]
    fn filled(&self) -> usize {
        self.slots.iter().filter(|&&bpm| bpm > EMPTY_SLOT_BPM).count()
    }

    #[cfg(test)]
    fn write_index(&self) -> usize {
        self.index
    }

    #[cfg(test)]
    fn slots(&self) -> &[f32; BPM_HISTORY_LEN] {
        &self.slots
    }
}

impl Default for BpmHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Below,
    Above,
}

/// Outcome of a rising crossing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PulseEvent {
    /// Plausible interval; folded into the average.
    Beat {
        interval_ms: u64,
        bpm: f32,
        average_bpm: f32,
    },
    /// First crossing after startup (`interval_ms == None`) or an interval
    /// outside the accepted range.
    Rejected { interval_ms: Option<u64> },
}

pub struct PulseDetector {
    config: PulseConfig,
    edge: Edge,
    last_peak_ms: Option<u64>,
    history: BpmHistory,
    instantaneous_bpm: f32,
    average_bpm: f32,
}

impl PulseDetector {
    pub fn new(config: PulseConfig) -> Self {
        Self {
            config,
            edge: Edge::Below,
            last_peak_ms: None,
            history: BpmHistory::new(),
            instantaneous_bpm: 0.0,
            average_bpm: 0.0,
        }
    }

    pub fn threshold(&self) -> u16 {
        self.config.threshold
    }

    /// Takes effect from the next sample.  Recorded beats are kept.
    pub fn set_threshold(&mut self, threshold: u16) {
        self.config.threshold = threshold;
    }

    pub fn edge(&self) -> Edge {
        self.edge
    }

    pub fn instantaneous_bpm(&self) -> f32 {
        self.instantaneous_bpm
    }

    pub fn average_bpm(&self) -> f32 {
        self.average_bpm
    }

    /// Rounded average, 0 while no beat has been accepted.
    pub fn heart_rate(&self) -> u32 {
        if self.average_bpm > EMPTY_SLOT_BPM {
            self.average_bpm.round() as u32
        } else {
            0
        }
    }

    pub fn history(&self) -> &BpmHistory {
        &self.history
    }

    /// Feed one ADC level sampled at `now_ms`.
    pub fn on_sample(&mut self, signal: u16, now_ms: u64) -> Option<PulseEvent> {
        let threshold = self.config.threshold;
        // Thresholds under the hysteresis re-arm at the ADC floor.
        let rearm = threshold.saturating_sub(self.config.hysteresis);

        match self.edge {
            Edge::Below if signal > threshold => {
                self.edge = Edge::Above;
                Some(self.on_rising_edge(now_ms))
            }
            Edge::Above if signal < rearm || signal == 0 => {
                self.edge = Edge::Below;
                None
            }
            _ => None,
        }
    }

    fn on_rising_edge(&mut self, now_ms: u64) -> PulseEvent {
        let interval_ms = self.last_peak_ms.map(|last| now_ms.saturating_sub(last));
        // Re-sync on every crossing so one double trigger costs one beat, not
        // every beat after it.
        self.last_peak_ms = Some(now_ms);

        match interval_ms {
            Some(interval)
                if (self.config.min_interval_ms..=self.config.max_interval_ms)
                    .contains(&interval) =>
            {
                self.instantaneous_bpm = 60_000.0 / interval as f32;
                self.history.push(self.instantaneous_bpm);
                self.average_bpm = self.history.average();
                log::debug!(
                    "Beat: {} ms -> {:.1} BPM (avg {:.1})",
                    interval,
                    self.instantaneous_bpm,
                    self.average_bpm
                );
                PulseEvent::Beat {
                    interval_ms: interval,
                    bpm: self.instantaneous_bpm,
                    average_bpm: self.average_bpm,
                }
            }
            _ => {
                log::debug!("Crossing rejected: interval {:?} ms", interval_ms);
                PulseEvent::Rejected { interval_ms }
            }
        }
    }
}

impl Default for PulseDetector {
    fn default() -> Self {
        Self::new(PulseConfig::default())
    }
}
