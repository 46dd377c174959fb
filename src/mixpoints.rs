//! Candidate EXIT / ENTRY points per track.
//!
//! Anchors come from structural section boundaries (outro, instrumental and
//! build-up to mix out; intro and instrumental to mix in), then from phrase
//! boundaries, then from synthesized fallbacks. Every anchor is snapped to a
//! nearby downbeat and weighted by how clean a cut it would be.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use serde::Serialize;

use crate::config::PlannerConfig;
use crate::track::{SectionKind, Track};

/// Confidence multiplier for anchors that could not be put on a downbeat.
const OFF_GRID_FACTOR: f64 = 0.85;

/// Confidence multiplier for anchors in the non-preferred half of a track.
const OFF_HALF_FACTOR: f64 = 0.6;

const PHRASE_CONFIDENCE: f64 = 0.6;
const FALLBACK_CONFIDENCE: f64 = 0.3;
const EDGE_CONFIDENCE: f64 = 0.15;

/// Fallback positions as a percentage of track duration.
const FALLBACK_EXIT_PERCENT: u64 = 85;
const FALLBACK_ENTRY_PERCENT: u64 = 5;

/// A fallback only moves onto a downbeat this many beats away or closer.
const FALLBACK_SNAP_BEATS: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MixRole {
    Entry,
    Exit,
}

/// How much voice is audible around a mix point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VocalDensity {
    None,
    Light,
    Heavy,
}

impl VocalDensity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "no vocals",
            Self::Light => "light vocals",
            Self::Heavy => "heavy vocals",
        }
    }

    fn confidence_factor(&self) -> f64 {
        match self {
            Self::None => 1.0,
            Self::Light => 0.8,
            Self::Heavy => 0.5,
        }
    }
}

/// A candidate transition anchor within one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixPoint {
    pub ms: u64,
    pub role: MixRole,
    pub section: Option<SectionKind>,
    pub vocals: VocalDensity,
    /// 0-1, higher = cleaner cut point.
    pub confidence: f64,
    /// Energy of the surrounding section.
    pub energy: f64,
    /// Synthesized because the track had no usable structure for this role.
    pub fallback: bool,
}

/// EXIT and ENTRY candidates for one track, best confidence first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MixPlan {
    pub exits: Vec<MixPoint>,
    pub entries: Vec<MixPoint>,
}

/// Plan every track in parallel, keyed by track id.
pub fn build_mix_plan(tracks: &[Track], cfg: &PlannerConfig) -> HashMap<String, MixPlan> {
    tracks
        .par_iter()
        .map(|track| (track.id.clone(), plan(track, cfg)))
        .collect()
}

/// Derive mix points for a single track. Never fails: tracks without usable
/// structure get low-confidence fallback points.
pub fn plan(track: &Track, cfg: &PlannerConfig) -> MixPlan {
    let exits = points_for_role(track, MixRole::Exit, cfg);
    let entries = points_for_role(track, MixRole::Entry, cfg);

    log::debug!(
        "Planned {}: {} exits, {} entries",
        track.id,
        exits.len(),
        entries.len()
    );

    MixPlan { exits, entries }
}

fn points_for_role(track: &Track, role: MixRole, cfg: &PlannerConfig) -> Vec<MixPoint> {
    let mut points = structural_points(track, role, cfg);
    if points.is_empty() {
        points = phrase_points(track, role, cfg);
    }
    if points.is_empty() {
        log::debug!("Track {} has no {:?} anchors, using fallback points", track.id, role);
        points = fallback_points(track, role, cfg);
    }
    finalize(points, role, cfg.max_points_per_role)
}

/// Base confidence of a section boundary for the given role, or None if the
/// section is not a mixing anchor for it.
fn section_confidence(kind: SectionKind, role: MixRole) -> Option<f64> {
    match (role, kind) {
        (MixRole::Exit, SectionKind::Outro) => Some(1.0),
        (MixRole::Exit, SectionKind::Instrumental) => Some(0.9),
        (MixRole::Exit, SectionKind::BuildUp) => Some(0.8),
        (MixRole::Entry, SectionKind::Intro) => Some(1.0),
        (MixRole::Entry, SectionKind::Instrumental) => Some(0.9),
        _ => None,
    }
}

fn structural_points(track: &Track, role: MixRole, cfg: &PlannerConfig) -> Vec<MixPoint> {
    track
        .segments
        .iter()
        .filter_map(|seg| {
            let base = section_confidence(seg.kind, role)?;
            let energy = seg.energy.unwrap_or(track.energy);
            Some(make_point(track, seg.start_ms, role, base, Some(seg.kind), Some(energy), false, cfg))
        })
        .collect()
}

fn phrase_points(track: &Track, role: MixRole, cfg: &PlannerConfig) -> Vec<MixPoint> {
    let half = track.duration_ms / 2;
    track
        .phrases
        .iter()
        .copied()
        .filter(|&ms| match role {
            MixRole::Exit => ms >= half && ms < track.duration_ms,
            MixRole::Entry => ms <= half,
        })
        .map(|ms| make_point(track, ms, role, PHRASE_CONFIDENCE, None, None, false, cfg))
        .collect()
}

/// Primary fallback (last downbeat before 85% / first downbeat after 5%,
/// or the bare timestamp when no downbeat lies within a bar of it) plus a
/// hard-edge fallback at the very end / start of the track.
fn fallback_points(track: &Track, role: MixRole, cfg: &PlannerConfig) -> Vec<MixPoint> {
    let duration = track.duration_ms;
    let bar = (track.beat_interval_ms() * FALLBACK_SNAP_BEATS).round() as u64;
    let (primary, edge) = match role {
        MixRole::Exit => {
            let target = duration.saturating_mul(FALLBACK_EXIT_PERCENT) / 100;
            let idx = track.downbeats.partition_point(|&d| d <= target);
            let ms = idx
                .checked_sub(1)
                .map(|i| track.downbeats[i])
                .filter(|&d| d.abs_diff(target) <= bar)
                .unwrap_or(target);
            (ms, duration)
        }
        MixRole::Entry => {
            let target = duration.saturating_mul(FALLBACK_ENTRY_PERCENT).div_ceil(100);
            let idx = track.downbeats.partition_point(|&d| d < target);
            let ms = track
                .downbeats
                .get(idx)
                .copied()
                .filter(|&d| d <= duration && d.abs_diff(target) <= bar)
                .unwrap_or(target);
            (ms, 0)
        }
    };

    vec![
        make_point(track, primary, role, FALLBACK_CONFIDENCE, None, None, true, cfg),
        make_point(track, edge, role, EDGE_CONFIDENCE, None, None, true, cfg),
    ]
}

#[allow(clippy::too_many_arguments)]
fn make_point(
    track: &Track,
    anchor_ms: u64,
    role: MixRole,
    base_confidence: f64,
    section: Option<SectionKind>,
    energy: Option<f64>,
    fallback: bool,
    cfg: &PlannerConfig,
) -> MixPoint {
    let anchor_ms = anchor_ms.min(track.duration_ms);
    let (ms, on_grid) = match snap_to_downbeat(track, anchor_ms, cfg.snap_tolerance_beats) {
        Some(d) => (d.min(track.duration_ms), true),
        None => (anchor_ms, false),
    };

    let vocals = vocal_density(track, ms, cfg);
    let mut confidence = base_confidence * vocals.confidence_factor();
    if !on_grid {
        confidence *= OFF_GRID_FACTOR;
    }
    if !in_preferred_half(track, ms, role) {
        confidence *= OFF_HALF_FACTOR;
    }

    MixPoint {
        ms,
        role,
        section: section.or_else(|| track.segment_at(ms).map(|s| s.kind)),
        vocals,
        confidence,
        energy: energy.unwrap_or_else(|| track.energy_at(ms)),
        fallback,
    }
}

/// Nearest downbeat within `tolerance_beats` beats of `ms`. Ties go to the
/// earlier downbeat. Downbeats are expected in ascending order; unsorted
/// input gives a poorer match but never panics.
pub fn snap_to_downbeat(track: &Track, ms: u64, tolerance_beats: f64) -> Option<u64> {
    let tolerance = (track.beat_interval_ms() * tolerance_beats).round() as u64;
    let downbeats = &track.downbeats;
    let idx = downbeats.partition_point(|&d| d < ms);

    let before = idx.checked_sub(1).and_then(|i| downbeats.get(i)).copied();
    let after = downbeats.get(idx).copied();

    let nearest = match (before, after) {
        (Some(b), Some(a)) => {
            if ms.abs_diff(b) <= a.abs_diff(ms) {
                b
            } else {
                a
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };

    (nearest.abs_diff(ms) <= tolerance).then_some(nearest)
}

/// Classify vocal presence in the window around `ms`.
pub fn vocal_density(track: &Track, ms: u64, cfg: &PlannerConfig) -> VocalDensity {
    let from = ms.saturating_sub(cfg.vocal_window_ms);
    let to = ms.saturating_add(cfg.vocal_window_ms).min(track.duration_ms);
    if to <= from {
        return VocalDensity::None;
    }

    let voiced: u64 = track.vocals.iter().map(|v| v.overlap(from, to)).sum();
    if voiced == 0 {
        return VocalDensity::None;
    }

    let ratio = (voiced as f64 / (to - from) as f64).min(1.0);
    if ratio >= cfg.heavy_vocal_ratio {
        VocalDensity::Heavy
    } else {
        VocalDensity::Light
    }
}

fn in_preferred_half(track: &Track, ms: u64, role: MixRole) -> bool {
    let half = track.duration_ms / 2;
    match role {
        MixRole::Exit => ms >= half,
        MixRole::Entry => ms <= half,
    }
}

/// Best confidence first, one point per timestamp, capped.
/// Equal confidence prefers later exits and earlier entries.
fn finalize(mut points: Vec<MixPoint>, role: MixRole, cap: usize) -> Vec<MixPoint> {
    points.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| match role {
                MixRole::Exit => b.ms.cmp(&a.ms),
                MixRole::Entry => a.ms.cmp(&b.ms),
            })
    });

    let mut seen = HashSet::new();
    points.retain(|p| seen.insert(p.ms));
    points.truncate(cap.max(1));
    points
}
