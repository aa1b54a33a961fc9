// TempoTracker - robust BPM estimation from debounced beat events
//
// Inter-beat gaps go into a bounded interval window. Once enough gaps exist,
// a median filter drops gaps further than `outlier_band * median` from the
// median, the survivors are averaged and converted to BPM. Estimates outside
// [min_bpm, max_bpm] are dropped quietly and the previous BPM stays current.

use ringbuffer::{AllocRingBuffer, RingBuffer};

use crate::analysis::onset::{BeatEvent, DetectionScores};
use crate::config::TempoConfig;

/// One accepted tempo estimate
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TempoEstimate {
    pub bpm: u32,
    /// Timestamp of the beat that produced this estimate
    pub observed_at_ms: u64,
    /// Mean of the three matched per-class scores (sub-threshold as 0), scaled to 0-100
    pub confidence: f32,
}

/// Coarse closeness of the current tempo to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoBand {
    /// Within 2 BPM
    OnTarget,
    /// Within 5 BPM
    Close,
    Off,
}

impl TempoBand {
    pub fn from_delta(delta: u32) -> Self {
        match delta {
            0..=2 => TempoBand::OnTarget,
            3..=5 => TempoBand::Close,
            _ => TempoBand::Off,
        }
    }
}

/// Aggregate statistics for the presentation layer
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TempoStats {
    /// Accepted beat events this session
    pub beat_count: u64,
    /// Tempo estimates currently in history
    pub estimate_count: usize,
    pub current_bpm: u32,
    /// Rounded mean BPM over history, 0 when empty
    pub mean_bpm: u32,
    /// |current - target|
    pub bpm_delta: u32,
    pub accuracy: f32,
    pub band: TempoBand,
}

/// Recent chart points with a display range around the target
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChartWindow {
    pub points: Vec<u32>,
    pub min_bpm: i64,
    pub max_bpm: i64,
}

pub struct TempoTracker {
    config: TempoConfig,
    intervals: AllocRingBuffer<u64>,
    last_beat_ms: Option<u64>,
    current_bpm: u32,
    target_bpm: i32,
    beat_count: u64,
    history: AllocRingBuffer<TempoEstimate>,
    chart: AllocRingBuffer<u32>,
}

impl Default for TempoTracker {
    fn default() -> Self {
        Self::new(TempoConfig::default(), 120)
    }
}

impl TempoTracker {
    pub fn new(config: TempoConfig, target_bpm: i32) -> Self {
        let intervals = AllocRingBuffer::new(config.interval_capacity.max(1));
        let history = AllocRingBuffer::new(config.history_capacity.max(1));
        let chart = AllocRingBuffer::new(config.chart_capacity.max(1));
        Self {
            config,
            intervals,
            last_beat_ms: None,
            current_bpm: 0,
            target_bpm,
            beat_count: 0,
            history,
            chart,
        }
    }

    /// Consume an accepted beat event
    ///
    /// The interval is measured against the previous beat's timestamp, and
    /// that timestamp is only replaced after the interval has been pushed and
    /// the estimate evaluated. Events that do not move the clock forward are
    /// ignored.
    ///
    /// # Returns
    /// The new estimate when one was accepted on this beat
    pub fn on_beat(&mut self, event: BeatEvent, scores: &DetectionScores) -> Option<TempoEstimate> {
        let now = event.timestamp_ms;
        if let Some(last) = self.last_beat_ms {
            if now <= last {
                tracing::debug!(
                    "[Tempo] Ignoring out-of-order beat at {} ms (last {} ms)",
                    now,
                    last
                );
                return None;
            }
            self.intervals.push(now - last);
        }
        self.beat_count += 1;

        let estimate = self.estimate_bpm().map(|bpm| TempoEstimate {
            bpm,
            observed_at_ms: now,
            confidence: scores.mean() * 100.0,
        });
        self.last_beat_ms = Some(now);

        if let Some(estimate) = estimate {
            self.record(estimate);
        }
        estimate
    }

    /// Median-filtered BPM over the interval window, range-checked
    fn estimate_bpm(&self) -> Option<u32> {
        if self.intervals.len() < self.config.min_intervals.max(1) {
            return None;
        }

        let mut sorted = self.intervals.to_vec();
        sorted.sort_unstable();
        let median = sorted[sorted.len() / 2] as f64;
        let band = median * self.config.outlier_band;

        let valid: Vec<f64> = sorted
            .iter()
            .map(|&interval| interval as f64)
            .filter(|interval| (interval - median).abs() < band)
            .collect();
        if valid.is_empty() || valid.len() < self.config.min_valid_intervals {
            tracing::trace!(
                "[Tempo] Only {} of {} intervals near median {:.0} ms",
                valid.len(),
                sorted.len(),
                median
            );
            return None;
        }

        let avg = valid.iter().sum::<f64>() / valid.len() as f64;
        let bpm = (60_000.0 / avg).round();
        if bpm < self.config.min_bpm as f64 || bpm > self.config.max_bpm as f64 {
            tracing::debug!("[Tempo] Discarding out-of-range estimate {} BPM", bpm);
            return None;
        }
        Some(bpm as u32)
    }

    fn record(&mut self, estimate: TempoEstimate) {
        self.current_bpm = estimate.bpm;

        // Truncate to the most recent `chart_retain` points on overflow
        if self.chart.len() >= self.chart.capacity() {
            let retain = self.config.chart_retain.min(self.chart.capacity());
            while self.chart.len() + 1 > retain.max(1) {
                self.chart.dequeue();
            }
        }
        self.chart.push(estimate.bpm);
        self.history.push(estimate);

        tracing::info!(
            "[Tempo] {} BPM (target {}, accuracy {:.0}%)",
            estimate.bpm,
            self.target_bpm,
            self.accuracy()
        );
    }

    pub fn current_bpm(&self) -> u32 {
        self.current_bpm
    }

    pub fn target_bpm(&self) -> i32 {
        self.target_bpm
    }

    /// Target tempo; any integer is allowed, far targets just score 0
    pub fn set_target_bpm(&mut self, target_bpm: i32) {
        self.target_bpm = target_bpm;
    }

    /// |current - target|
    pub fn bpm_delta(&self) -> u32 {
        (self.current_bpm as i64 - self.target_bpm as i64).unsigned_abs() as u32
    }

    /// `max(0, 100 - penalty * |current - target|)`
    ///
    /// Before the first estimate the current tempo reads 0, so low targets
    /// still score against it.
    pub fn accuracy(&self) -> f32 {
        (100.0 - self.config.accuracy_penalty_per_bpm * self.bpm_delta() as f32).max(0.0)
    }

    pub fn band(&self) -> TempoBand {
        TempoBand::from_delta(self.bpm_delta())
    }

    /// History, oldest first
    pub fn history(&self) -> Vec<TempoEstimate> {
        self.history.to_vec()
    }

    /// Chart series, oldest first
    pub fn chart_series(&self) -> Vec<u32> {
        self.chart.to_vec()
    }

    /// Interval window, oldest first
    pub fn intervals(&self) -> Vec<u64> {
        self.intervals.to_vec()
    }

    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }

    pub fn stats(&self) -> TempoStats {
        let estimate_count = self.history.len();
        let mean_bpm = if estimate_count == 0 {
            0
        } else {
            let sum: u64 = self.history.iter().map(|e| e.bpm as u64).sum();
            (sum as f64 / estimate_count as f64).round() as u32
        };
        TempoStats {
            beat_count: self.beat_count,
            estimate_count,
            current_bpm: self.current_bpm,
            mean_bpm,
            bpm_delta: self.bpm_delta(),
            accuracy: self.accuracy(),
            band: self.band(),
        }
    }

    /// Latest chart points with a display range that always covers the target
    pub fn chart_window(&self, target_bpm: i32) -> Option<ChartWindow> {
        if self.chart.len() < 2 {
            return None;
        }
        let skip = self.chart.len().saturating_sub(self.config.chart_display_points);
        let points: Vec<u32> = self.chart.iter().skip(skip).copied().collect();

        let lowest = points.iter().copied().min().unwrap_or(0) as i64;
        let highest = points.iter().copied().max().unwrap_or(0) as i64;
        let target = target_bpm as i64;

        Some(ChartWindow {
            min_bpm: (target - self.config.chart_margin_bpm)
                .min(lowest - self.config.chart_padding_bpm),
            max_bpm: (target + self.config.chart_margin_bpm)
                .max(highest + self.config.chart_padding_bpm),
            points,
        })
    }

    /// Start a fresh monitoring session
    pub fn reset(&mut self) {
        self.intervals.clear();
        self.history.clear();
        self.chart.clear();
        self.last_beat_ms = None;
        self.current_bpm = 0;
        self.beat_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beat(timestamp_ms: u64) -> BeatEvent {
        BeatEvent { timestamp_ms }
    }

    fn feed(tracker: &mut TempoTracker, times: &[u64]) -> Vec<Option<TempoEstimate>> {
        let scores = DetectionScores {
            kick: 0.9,
            snare: 0.3,
            hihat: 0.0,
        };
        times.iter().map(|&t| tracker.on_beat(beat(t), &scores)).collect()
    }

    #[test]
    fn test_constant_500ms_converges_to_120() {
        let mut tracker = TempoTracker::default();
        let results = feed(&mut tracker, &[1000, 1500, 2000, 2500, 3000]);

        // Four intervals are needed, so only the fifth beat estimates
        assert!(results[..4].iter().all(Option::is_none));
        let estimate = results[4].expect("fifth beat should estimate");
        assert_eq!(estimate.bpm, 120);
        assert_eq!(estimate.observed_at_ms, 3000);
        assert!((estimate.confidence - 40.0).abs() < 1e-3);
        assert_eq!(tracker.current_bpm(), 120);
        assert_eq!(tracker.intervals(), vec![500, 500, 500, 500]);
    }

    #[test]
    fn test_outlier_excluded_by_median_filter() {
        let mut tracker = TempoTracker::default();
        // Gaps: 600, 600, 600, 1500
        feed(&mut tracker, &[0, 600, 1200, 1800, 3300]);

        assert_eq!(tracker.current_bpm(), 100);
        // Unfiltered mean would be 825 ms, about 73 BPM
        assert_ne!(tracker.current_bpm(), 73);
    }

    #[test]
    fn test_too_few_valid_intervals() {
        let mut tracker = TempoTracker::default();
        // Gaps: 400, 800, 400, 800 -> median 800, only two near it
        let results = feed(&mut tracker, &[0, 400, 1200, 1600, 2400]);
        assert!(results.iter().all(Option::is_none));
        assert_eq!(tracker.current_bpm(), 0);
    }

    #[test]
    fn test_out_of_range_keeps_previous_bpm() {
        let mut tracker = TempoTracker::default();
        feed(&mut tracker, &[0, 500, 1000, 1500, 2000]);
        assert_eq!(tracker.current_bpm(), 120);

        // 2000 ms gaps take over the median and would give 30 BPM
        let results = feed(&mut tracker, &[4000, 6000, 8000, 10000]);
        assert!(results[..3].iter().all(Option::is_some));
        assert!(results[3].is_none());
        assert_eq!(tracker.current_bpm(), 120);
        assert_eq!(tracker.history().len(), 4);
    }

    #[test]
    fn test_too_fast_rejected() {
        let mut tracker = TempoTracker::default();
        // 250 ms gaps -> 240 BPM
        let results = feed(&mut tracker, &[0, 250, 500, 750, 1000, 1250]);
        assert!(results.iter().all(Option::is_none));
        assert!(tracker.history().is_empty());
    }

    #[test]
    fn test_interval_window_capacity() {
        let mut tracker = TempoTracker::default();
        let times: Vec<u64> = (0..20).map(|i| i * 500).collect();
        feed(&mut tracker, &times);
        assert_eq!(tracker.intervals().len(), 8);
        assert_eq!(tracker.beat_count(), 20);
    }

    #[test]
    fn test_out_of_order_beat_ignored() {
        let mut tracker = TempoTracker::default();
        feed(&mut tracker, &[1000, 1500]);
        assert!(feed(&mut tracker, &[1200])[0].is_none());
        assert_eq!(tracker.intervals(), vec![500]);
        assert_eq!(tracker.beat_count(), 2);
    }

    #[test]
    fn test_accuracy_formula() {
        let mut tracker = TempoTracker::default();
        assert_eq!(tracker.accuracy(), 0.0);

        feed(&mut tracker, &[0, 500, 1000, 1500, 2000]);
        tracker.set_target_bpm(120);
        assert_eq!(tracker.accuracy(), 100.0);
        assert_eq!(tracker.band(), TempoBand::OnTarget);

        tracker.set_target_bpm(130);
        assert_eq!(tracker.accuracy(), 70.0);
        assert_eq!(tracker.band(), TempoBand::Off);

        tracker.set_target_bpm(155);
        assert_eq!(tracker.accuracy(), 0.0);

        tracker.set_target_bpm(-40);
        assert_eq!(tracker.accuracy(), 0.0);
    }

    #[test]
    fn test_accuracy_before_first_estimate() {
        let mut tracker = TempoTracker::new(TempoConfig::default(), 20);
        let stats = tracker.stats();
        assert_eq!(stats.current_bpm, 0);
        assert_eq!(stats.bpm_delta, 20);
        assert_eq!(stats.accuracy, 40.0);

        tracker.set_target_bpm(0);
        assert_eq!(tracker.accuracy(), 100.0);
    }

    #[test]
    fn test_band_thresholds() {
        assert_eq!(TempoBand::from_delta(0), TempoBand::OnTarget);
        assert_eq!(TempoBand::from_delta(2), TempoBand::OnTarget);
        assert_eq!(TempoBand::from_delta(3), TempoBand::Close);
        assert_eq!(TempoBand::from_delta(5), TempoBand::Close);
        assert_eq!(TempoBand::from_delta(6), TempoBand::Off);
    }

    #[test]
    fn test_history_and_chart_bounds() {
        let mut tracker = TempoTracker::default();
        let times: Vec<u64> = (0..120).map(|i| i * 500).collect();
        feed(&mut tracker, &times);

        // 116 estimates: history keeps the latest 50
        assert_eq!(tracker.history().len(), 50);
        assert_eq!(tracker.history()[49].observed_at_ms, 119 * 500);

        // Chart reached 100, truncated to 50 on the 101st, then grew to 65
        assert_eq!(tracker.chart_series().len(), 65);
    }

    #[test]
    fn test_stats() {
        let mut tracker = TempoTracker::new(TempoConfig::default(), 118);
        feed(&mut tracker, &[0, 500, 1000, 1500, 2000, 2500]);

        let stats = tracker.stats();
        assert_eq!(stats.beat_count, 6);
        assert_eq!(stats.estimate_count, 2);
        assert_eq!(stats.current_bpm, 120);
        assert_eq!(stats.mean_bpm, 120);
        assert_eq!(stats.bpm_delta, 2);
        assert_eq!(stats.accuracy, 94.0);
        assert_eq!(stats.band, TempoBand::OnTarget);
    }

    #[test]
    fn test_chart_window_range() {
        let mut tracker = TempoTracker::default();
        assert!(tracker.chart_window(120).is_none());

        feed(&mut tracker, &[0, 500, 1000, 1500, 2000, 2500]);
        let window = tracker.chart_window(120).unwrap();
        assert_eq!(window.points, vec![120, 120]);
        assert_eq!(window.min_bpm, 100);
        assert_eq!(window.max_bpm, 140);

        let window = tracker.chart_window(60).unwrap();
        assert_eq!(window.min_bpm, 40);
        assert_eq!(window.max_bpm, 125);
    }

    #[test]
    fn test_reset() {
        let mut tracker = TempoTracker::default();
        feed(&mut tracker, &[0, 500, 1000, 1500, 2000]);
        tracker.reset();

        assert_eq!(tracker.current_bpm(), 0);
        assert!(tracker.history().is_empty());
        assert!(tracker.chart_series().is_empty());
        assert!(tracker.intervals().is_empty());
        assert_eq!(tracker.stats().beat_count, 0);

        // A beat long after the reset must not produce a stale interval
        feed(&mut tracker, &[60_000]);
        assert!(tracker.intervals().is_empty());
    }
}
