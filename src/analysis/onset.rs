// OnsetDetector - template-matching beat detection
//
// Each tick the live frame is matched against every populated template.
// Scores become per-class hit decisions through fixed thresholds, and a frame
// qualifies as a beat when:
//
//   kick_hit OR snare_hit OR (hihat_hit AND NOT kick_hit AND NOT snare_hit)
//
// A single physical strike often excites several templates, so hi-hat hits
// only count on their own. Qualifying frames become beat events unless one
// was accepted within the debounce floor (sustained resonance re-triggers).

use crate::analysis::correlation::CrossCorrelationMatcher;
use crate::calibration::{DrumClass, TemplateStore};
use crate::config::DetectionConfig;

/// Per-class similarity scores for one frame, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectionScores {
    pub kick: f32,
    pub snare: f32,
    pub hihat: f32,
}

impl DetectionScores {
    pub fn get(&self, class: DrumClass) -> f32 {
        match class {
            DrumClass::Kick => self.kick,
            DrumClass::Snare => self.snare,
            DrumClass::HiHat => self.hihat,
        }
    }

    fn set(&mut self, class: DrumClass, score: f32) {
        match class {
            DrumClass::Kick => self.kick = score,
            DrumClass::Snare => self.snare = score,
            DrumClass::HiHat => self.hihat = score,
        }
    }

    /// Keep only the scores of classes that hit, zeroing the rest
    pub fn masked(&self, hits: &HitFlags) -> DetectionScores {
        let keep = |hit: bool, score: f32| if hit { score } else { 0.0 };
        DetectionScores {
            kick: keep(hits.kick, self.kick),
            snare: keep(hits.snare, self.snare),
            hihat: keep(hits.hihat, self.hihat),
        }
    }

    pub fn mean(&self) -> f32 {
        (self.kick + self.snare + self.hihat) / 3.0
    }

    /// Scores as 0-100 display levels
    pub fn levels(&self) -> DetectionLevels {
        let pct = |score: f32| (score * 100.0).round().clamp(0.0, 100.0) as u8;
        DetectionLevels {
            kick: pct(self.kick),
            snare: pct(self.snare),
            hihat: pct(self.hihat),
        }
    }
}

/// Live detection levels (0-100) for level meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DetectionLevels {
    pub kick: u8,
    pub snare: u8,
    pub hihat: u8,
}

/// Per-class hit decisions for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HitFlags {
    pub kick: bool,
    pub snare: bool,
    pub hihat: bool,
}

impl HitFlags {
    /// Priority rule: hi-hat only counts when neither kick nor snare hit
    pub fn qualifies(&self) -> bool {
        self.kick || self.snare || (self.hihat && !self.kick && !self.snare)
    }
}

/// An accepted, debounced percussive onset
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BeatEvent {
    /// Monotonic clock reading in milliseconds
    pub timestamp_ms: u64,
}

/// Everything the detector derived from one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDetection {
    /// Raw matcher output
    pub scores: DetectionScores,
    pub hits: HitFlags,
    /// Scores at or below their class threshold reported as 0
    pub matched: DetectionScores,
    /// Frame passed the hit/priority rule (before debounce)
    pub candidate: bool,
    /// Set when the candidate survived debounce
    pub beat: Option<BeatEvent>,
}

/// Matches frames against templates and emits debounced beat events
pub struct OnsetDetector {
    matcher: CrossCorrelationMatcher,
    kick_threshold: f32,
    snare_threshold: f32,
    hihat_threshold: f32,
    debounce_ms: u64,
    frame_size: usize,
    last_beat_ms: Option<u64>,
}

impl Default for OnsetDetector {
    fn default() -> Self {
        Self::with_config(&DetectionConfig::default())
    }
}

impl OnsetDetector {
    /// Create a detector with explicit configuration parameters
    pub fn with_config(config: &DetectionConfig) -> Self {
        Self {
            matcher: CrossCorrelationMatcher::from_config(config),
            kick_threshold: config.kick_threshold,
            snare_threshold: config.snare_threshold,
            hihat_threshold: config.hihat_threshold,
            debounce_ms: config.debounce_ms,
            frame_size: config.frame_size.max(1),
            last_beat_ms: None,
        }
    }

    pub fn threshold(&self, class: DrumClass) -> f32 {
        match class {
            DrumClass::Kick => self.kick_threshold,
            DrumClass::Snare => self.snare_threshold,
            DrumClass::HiHat => self.hihat_threshold,
        }
    }

    /// Score the frame against every populated template
    ///
    /// Unpopulated classes score 0. Only the first `frame_size` samples of
    /// the frame are matched.
    pub fn score(&self, frame: &[f32], templates: &TemplateStore) -> DetectionScores {
        let live = &frame[..frame.len().min(self.frame_size)];
        let mut scores = DetectionScores::default();
        for (class, template) in templates.populated() {
            scores.set(class, self.matcher.score(template, live));
        }
        scores
    }

    /// Strict `score > threshold` per class
    pub fn classify(&self, scores: &DetectionScores) -> HitFlags {
        HitFlags {
            kick: scores.kick > self.kick_threshold,
            snare: scores.snare > self.snare_threshold,
            hihat: scores.hihat > self.hihat_threshold,
        }
    }

    /// Run one detection tick
    ///
    /// # Arguments
    /// * `frame` - Live audio frame
    /// * `templates` - Calibrated templates
    /// * `timestamp_ms` - Monotonic clock reading for this tick
    pub fn process(
        &mut self,
        frame: &[f32],
        templates: &TemplateStore,
        timestamp_ms: u64,
    ) -> FrameDetection {
        let scores = self.score(frame, templates);
        let hits = self.classify(&scores);
        let matched = scores.masked(&hits);
        let candidate = hits.qualifies();

        let beat = if candidate && self.accept(timestamp_ms) {
            tracing::debug!(
                "[Onset] Beat at {} ms (kick {:.2}, snare {:.2}, hihat {:.2})",
                timestamp_ms,
                scores.kick,
                scores.snare,
                scores.hihat
            );
            Some(BeatEvent { timestamp_ms })
        } else {
            None
        };

        FrameDetection {
            scores,
            hits,
            matched,
            candidate,
            beat,
        }
    }

    /// Debounce gate: accept when more than `debounce_ms` has elapsed
    fn accept(&mut self, timestamp_ms: u64) -> bool {
        let accepted = match self.last_beat_ms {
            None => true,
            Some(last) => timestamp_ms.saturating_sub(last) > self.debounce_ms,
        };
        if accepted {
            self.last_beat_ms = Some(timestamp_ms);
        } else {
            tracing::trace!("[Onset] Candidate at {} ms debounced", timestamp_ms);
        }
        accepted
    }

    /// Timestamp of the last accepted beat
    pub fn last_beat_ms(&self) -> Option<u64> {
        self.last_beat_ms
    }

    /// Forget debounce history (new monitoring session)
    pub fn reset(&mut self) {
        self.last_beat_ms = None;
    }
}
