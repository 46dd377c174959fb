//! Precomputed per-track features consumed by the planner.
//!
//! Feature extraction happens elsewhere; these records arrive already
//! analyzed and are treated as immutable for the duration of a request.

pub mod camelot;
pub mod load;

use serde::{Deserialize, Serialize};

use camelot::CamelotKey;

/// Structural section label attached to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Intro,
    Verse,
    Chorus,
    Bridge,
    Instrumental,
    Outro,
    #[serde(alias = "buildup", alias = "build-up")]
    BuildUp,
}

impl SectionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Verse => "verse",
            Self::Chorus => "chorus",
            Self::Bridge => "bridge",
            Self::Instrumental => "instrumental",
            Self::Outro => "outro",
            Self::BuildUp => "build-up",
        }
    }
}

/// A labelled structural section, `[start_ms, end_ms)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SectionKind,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Section-local energy (0-1), when the analyzer produced one.
    #[serde(default)]
    pub energy: Option<f64>,
}

impl Segment {
    pub fn contains(&self, ms: u64) -> bool {
        self.start_ms <= ms && ms < self.end_ms
    }
}

/// A span where a voice is audible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocalInterval {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl VocalInterval {
    /// Milliseconds of overlap with `[from, to)`.
    pub fn overlap(&self, from: u64, to: u64) -> u64 {
        let start = self.start_ms.max(from);
        let end = self.end_ms.min(to);
        end.saturating_sub(start)
    }
}

/// An analyzed track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    /// Content hash used by callers for deduplication; opaque here.
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub title: String,
    pub bpm: f64,
    /// Camelot notation, e.g. "8A".
    pub key: String,
    pub energy: f64,
    #[serde(default)]
    pub danceability: f64,
    pub duration_ms: u64,
    #[serde(default)]
    pub beats: Vec<u64>,
    #[serde(default)]
    pub downbeats: Vec<u64>,
    #[serde(default)]
    pub phrases: Vec<u64>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub vocals: Vec<VocalInterval>,
}

impl Track {
    pub fn camelot(&self) -> Option<CamelotKey> {
        CamelotKey::parse(&self.key)
    }

    /// Display name: title when present, id otherwise.
    pub fn display_name(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.id
        } else {
            &self.title
        }
    }

    /// Milliseconds per beat, falling back to 120 BPM when tempo is unknown.
    pub fn beat_interval_ms(&self) -> f64 {
        if self.bpm > 0.0 {
            60_000.0 / self.bpm
        } else {
            500.0
        }
    }

    /// The segment covering `ms`. The final instant of the track belongs to
    /// the last segment that ends there.
    pub fn segment_at(&self, ms: u64) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| s.contains(ms))
            .or_else(|| self.segments.iter().rev().find(|s| s.end_ms == ms && ms > s.start_ms))
    }

    /// Energy of the section at `ms`, or the whole-track energy.
    pub fn energy_at(&self, ms: u64) -> f64 {
        self.segment_at(ms)
            .and_then(|s| s.energy)
            .unwrap_or(self.energy)
    }

    /// Sort and clean timing data in place. Returns a description of every
    /// correction made (empty if the record was already well-formed).
    pub fn normalize(&mut self) -> Vec<String> {
        let mut fixes = Vec::new();

        for (name, stamps) in [
            ("beats", &mut self.beats),
            ("downbeats", &mut self.downbeats),
            ("phrases", &mut self.phrases),
        ] {
            let before = stamps.clone();
            stamps.sort_unstable();
            stamps.dedup();
            if *stamps != before {
                fixes.push(format!("{name} were unsorted or duplicated"));
            }
        }

        let segments_before = self.segments.len();
        self.segments.retain(|s| s.end_ms >= s.start_ms);
        if self.segments.len() != segments_before {
            fixes.push(format!(
                "dropped {} segment(s) ending before they start",
                segments_before - self.segments.len()
            ));
        }
        if !self.segments.is_sorted_by_key(|s| s.start_ms) {
            self.segments.sort_by_key(|s| s.start_ms);
            fixes.push("segments were out of order".to_string());
        }

        let vocals_before = self.vocals.len();
        self.vocals.retain(|v| v.end_ms >= v.start_ms);
        if self.vocals.len() != vocals_before {
            fixes.push(format!(
                "dropped {} vocal interval(s) ending before they start",
                vocals_before - self.vocals.len()
            ));
        }
        if !self.vocals.is_sorted_by_key(|v| v.start_ms) {
            self.vocals.sort_by_key(|v| v.start_ms);
            fixes.push("vocal intervals were out of order".to_string());
        }

        fixes
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_segment_at_boundaries() {
        let t = structured_track("a", 128.0, "8A");
        assert_eq!(t.segment_at(0).map(|s| s.kind), Some(SectionKind::Intro));
        assert_eq!(t.segment_at(30_000).map(|s| s.kind), Some(SectionKind::Verse));
        // Final instant belongs to the outro
        assert_eq!(t.segment_at(240_000).map(|s| s.kind), Some(SectionKind::Outro));
        assert!(t.segment_at(250_000).is_none());
    }

    #[test]
    fn test_energy_at_prefers_section_energy() {
        let mut t = structured_track("a", 128.0, "8A");
        t.segments[5].energy = Some(0.3);
        assert!((t.energy_at(200_000) - 0.3).abs() < 1e-9);
        assert!((t.energy_at(100_000) - t.energy).abs() < 1e-9);
    }

    #[test]
    fn test_vocal_overlap() {
        let v = VocalInterval { start_ms: 1_000, end_ms: 5_000 };
        assert_eq!(v.overlap(0, 2_000), 1_000);
        assert_eq!(v.overlap(2_000, 3_000), 1_000);
        assert_eq!(v.overlap(6_000, 9_000), 0);
    }

    #[test]
    fn test_normalize_sorts_and_reports() {
        let mut t = track("a", 120.0, "1A", 10_000);
        t.downbeats = vec![4_000, 2_000, 2_000, 0];
        t.segments = vec![
            segment(SectionKind::Outro, 5_000, 10_000),
            segment(SectionKind::Intro, 0, 5_000),
            segment(SectionKind::Verse, 8_000, 7_000),
        ];
        let fixes = t.normalize();
        assert_eq!(t.downbeats, vec![0, 2_000, 4_000]);
        assert_eq!(t.segments.len(), 2);
        assert_eq!(t.segments[0].kind, SectionKind::Intro);
        assert_eq!(fixes.len(), 3);

        // Already clean: nothing to report
        assert!(t.normalize().is_empty());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let mut t = track("abc", 120.0, "1A", 1_000);
        t.title.clear();
        assert_eq!(t.display_name(), "abc");
    }
}
