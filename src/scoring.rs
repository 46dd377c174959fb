//! Pairwise transition scoring.
//!
//! A transition from an EXIT point of track A into an ENTRY point of track B
//! is scored as a weighted sum of four sub-scores, each normalized to 0-1:
//! harmonic (Camelot wheel distance), tempo (ratio, with double/half time
//! treated as compatible), energy continuity, and structural/vocal fitness of
//! the two points. The weighted sum is reported on a 0-100 scale.

use std::cmp::Ordering;

use serde::Serialize;

use crate::config::ScoringConfig;
use crate::mixpoints::{MixPlan, MixPoint, VocalDensity};
use crate::track::camelot::{CamelotKey, MAX_WHEEL_STEPS};
use crate::track::{SectionKind, Track};

const SCORE_SCALE: f64 = 100.0;

// Harmonic sub-score anchors
const SAME_KEY: f64 = 1.0;
const ADJACENT_KEY: f64 = 0.9;
const RELATIVE_KEY: f64 = 0.9;
/// Score at the first "other" relation (one step plus a mode change).
const DECAY_START: f64 = 0.6;
/// Score at the opposite side of the wheel.
const HARMONIC_FLOOR: f64 = 0.05;
const UNKNOWN_KEY: f64 = 0.3;

const UNKNOWN_TEMPO: f64 = 0.5;

// Structural fitness blend
const SECTION_SHARE: f64 = 0.4;
const VOCAL_SHARE: f64 = 0.4;
const CONFIDENCE_SHARE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionType {
    Cut,
    Crossfade,
    HarmonicBlend,
}

impl TransitionType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cut => "CUT",
            Self::Crossfade => "CROSSFADE",
            Self::HarmonicBlend => "HARMONIC_BLEND",
        }
    }
}

/// Normalized (0-1) components of a transition score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScores {
    pub harmonic: f64,
    pub tempo: f64,
    pub energy: f64,
    pub structure: f64,
}

/// One EXIT point of the outgoing track paired with one ENTRY point of the
/// incoming track, evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionCandidate {
    pub score: f64,
    pub kind: TransitionType,
    /// False when the score is below the minimum-viability threshold.
    pub viable: bool,
    pub sub_scores: SubScores,
    pub exit: MixPoint,
    pub entry: MixPoint,
    pub rationale: String,
}

impl TransitionCandidate {
    fn combined_confidence(&self) -> f64 {
        self.exit.confidence + self.entry.confidence
    }

    /// Ordering used to pick the best candidate for a track pair: score,
    /// then combined point confidence, then earlier exit, then earlier entry.
    fn rank(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.combined_confidence().total_cmp(&other.combined_confidence()))
            .then_with(|| other.exit.ms.cmp(&self.exit.ms))
            .then_with(|| other.entry.ms.cmp(&self.entry.ms))
    }
}

/// Score a single EXIT → ENTRY pairing. Pure; incompatible pairings are
/// still returned (with `viable == false`) so callers can report them.
pub fn score(
    from: &Track,
    exit: &MixPoint,
    to: &Track,
    entry: &MixPoint,
    cfg: &ScoringConfig,
) -> TransitionCandidate {
    let from_key = from.camelot();
    let to_key = to.camelot();

    let sub_scores = SubScores {
        harmonic: harmonic_score(from_key, to_key),
        tempo: tempo_score(from.bpm, to.bpm, cfg),
        energy: energy_score(exit.energy, entry.energy, cfg),
        structure: structure_score(exit, entry, cfg),
    };

    let w = &cfg.weights;
    let score = SCORE_SCALE
        * (w.harmonic * sub_scores.harmonic
            + w.tempo * sub_scores.tempo
            + w.energy * sub_scores.energy
            + w.structure * sub_scores.structure);

    let viable = score >= cfg.min_viable_score;
    let kind = classify(score, &sub_scores, cfg);

    let key_part = match (from_key, to_key) {
        (Some(a), Some(b)) => format!("{a} -> {b} ({})", a.relation(&b)),
        _ => format!("{} -> {} (unknown key)", display_key(&from.key), display_key(&to.key)),
    };
    let mut rationale = format!(
        "{key_part}; {:.1} -> {:.1} BPM ({}); energy {:.2} -> {:.2}; out of {} with {}, into {} with {}",
        from.bpm,
        to.bpm,
        tempo_label(from.bpm, to.bpm, cfg),
        exit.energy,
        entry.energy,
        section_label(exit.section),
        exit.vocals.label(),
        section_label(entry.section),
        entry.vocals.label(),
    );
    if !viable {
        rationale.insert_str(0, "incompatible: ");
    }

    TransitionCandidate {
        score,
        kind,
        viable,
        sub_scores,
        exit: exit.clone(),
        entry: entry.clone(),
        rationale,
    }
}

/// Best pairing of any EXIT of `from` with any ENTRY of `to`.
/// None only if one of the plans has no points for the needed role.
pub fn best_transition(
    from: &Track,
    from_plan: &MixPlan,
    to: &Track,
    to_plan: &MixPlan,
    cfg: &ScoringConfig,
) -> Option<TransitionCandidate> {
    let mut best: Option<TransitionCandidate> = None;

    for exit in &from_plan.exits {
        for entry in &to_plan.entries {
            let candidate = score(from, exit, to, entry, cfg);
            let better = match &best {
                Some(current) => candidate.rank(current) == Ordering::Greater,
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }
    }

    best
}

fn classify(score: f64, sub: &SubScores, cfg: &ScoringConfig) -> TransitionType {
    if score >= cfg.harmonic_blend_score
        && sub.harmonic >= cfg.blend_min_harmonic
        && sub.tempo >= cfg.blend_min_tempo
    {
        TransitionType::HarmonicBlend
    } else if score >= cfg.crossfade_score {
        TransitionType::Crossfade
    } else {
        TransitionType::Cut
    }
}

/// Camelot compatibility. Symmetric in its arguments.
pub fn harmonic_score(a: Option<CamelotKey>, b: Option<CamelotKey>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return UNKNOWN_KEY;
    };

    let steps = a.steps_to(&b);
    let same_mode = a.mode() == b.mode();
    match (steps, same_mode) {
        (0, true) => SAME_KEY,
        (1, true) => ADJACENT_KEY,
        (0, false) => RELATIVE_KEY,
        _ => {
            // Mode change counts as half a step
            let distance = steps as f64 + if same_mode { 0.0 } else { 0.5 };
            let max = MAX_WHEEL_STEPS as f64;
            let span = max - 1.5;
            let remaining = (max - distance).max(0.0) / span;
            HARMONIC_FLOOR + (DECAY_START - HARMONIC_FLOOR) * remaining.min(1.0)
        }
    }
}

/// Tempo compatibility from the log tempo ratio, also checking double and
/// half time. 1.0 at equal tempo, 0.0 at or beyond the tolerance.
pub fn tempo_score(from_bpm: f64, to_bpm: f64, cfg: &ScoringConfig) -> f64 {
    if from_bpm <= 0.0 || to_bpm <= 0.0 {
        return UNKNOWN_TEMPO;
    }

    let tolerance = (1.0 + cfg.tempo_tolerance.max(1e-6)).ln();
    let curve = |deviation: f64| {
        if deviation >= tolerance {
            0.0
        } else {
            1.0 - (deviation / tolerance).powi(2)
        }
    };

    let log_ratio = (to_bpm / from_bpm).ln();
    let direct = curve(log_ratio.abs());
    let octave = curve((log_ratio.abs() - std::f64::consts::LN_2).abs()) * cfg.half_double_factor;
    direct.max(octave)
}

fn tempo_label(from_bpm: f64, to_bpm: f64, cfg: &ScoringConfig) -> String {
    if from_bpm <= 0.0 || to_bpm <= 0.0 {
        return "unknown tempo".to_string();
    }
    let pct = (to_bpm / from_bpm - 1.0) * 100.0;
    let direct = (to_bpm / from_bpm).ln().abs();
    let octave = (direct - std::f64::consts::LN_2).abs();
    let tolerance = (1.0 + cfg.tempo_tolerance).ln();
    if octave < direct && octave < tolerance {
        if to_bpm > from_bpm {
            "double time".to_string()
        } else {
            "half time".to_string()
        }
    } else {
        format!("{pct:+.1}%")
    }
}

/// Energy continuity. Rising energy is penalized less than falling energy.
pub fn energy_score(exit_energy: f64, entry_energy: f64, cfg: &ScoringConfig) -> f64 {
    let delta = entry_energy - exit_energy;
    let penalty = if delta >= 0.0 {
        cfg.rise_penalty * delta
    } else {
        cfg.drop_penalty * -delta
    };
    (1.0 - penalty).clamp(0.0, 1.0)
}

fn exit_section_fit(section: Option<SectionKind>) -> f64 {
    match section {
        Some(SectionKind::Outro) | Some(SectionKind::Instrumental) => 1.0,
        Some(SectionKind::BuildUp) => 0.9,
        Some(SectionKind::Bridge) => 0.5,
        Some(SectionKind::Intro) => 0.4,
        Some(SectionKind::Verse) => 0.3,
        Some(SectionKind::Chorus) => 0.2,
        None => 0.5,
    }
}

fn entry_section_fit(section: Option<SectionKind>) -> f64 {
    match section {
        Some(SectionKind::Intro) | Some(SectionKind::Instrumental) => 1.0,
        Some(SectionKind::BuildUp) => 0.7,
        Some(SectionKind::Bridge) => 0.5,
        Some(SectionKind::Verse) => 0.4,
        Some(SectionKind::Chorus) => 0.3,
        Some(SectionKind::Outro) => 0.2,
        None => 0.5,
    }
}

fn vocal_fit(vocals: VocalDensity) -> f64 {
    match vocals {
        VocalDensity::None => 1.0,
        VocalDensity::Light => 0.6,
        VocalDensity::Heavy => 0.2,
    }
}

/// How well suited the two points are for mixing out and in, with a
/// penalty when both carry heavy vocals.
pub fn structure_score(exit: &MixPoint, entry: &MixPoint, cfg: &ScoringConfig) -> f64 {
    let exit_fit = SECTION_SHARE * exit_section_fit(exit.section)
        + VOCAL_SHARE * vocal_fit(exit.vocals)
        + CONFIDENCE_SHARE * exit.confidence.clamp(0.0, 1.0);
    let entry_fit = SECTION_SHARE * entry_section_fit(entry.section)
        + VOCAL_SHARE * vocal_fit(entry.vocals)
        + CONFIDENCE_SHARE * entry.confidence.clamp(0.0, 1.0);

    let mut fitness = (exit_fit + entry_fit) / 2.0;
    if exit.vocals == VocalDensity::Heavy && entry.vocals == VocalDensity::Heavy {
        fitness -= cfg.vocal_clash_penalty;
    }
    fitness.clamp(0.0, 1.0)
}

fn section_label(section: Option<SectionKind>) -> &'static str {
    section.map(|s| s.label()).unwrap_or("unlabelled section")
}

fn display_key(raw: &str) -> &str {
    if raw.trim().is_empty() { "?" } else { raw.trim() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::mixpoints::{MixRole, plan};
    use crate::track::camelot::Mode;
    use crate::track::fixtures::{structured_track, track};

    fn cfg() -> ScoringConfig {
        ScoringConfig::default()
    }

    fn key(s: &str) -> Option<CamelotKey> {
        CamelotKey::parse(s)
    }

    fn point(ms: u64, role: MixRole, section: Option<SectionKind>, vocals: VocalDensity) -> MixPoint {
        MixPoint {
            ms,
            role,
            section,
            vocals,
            confidence: 1.0,
            energy: 0.7,
            fallback: false,
        }
    }

    #[test]
    fn test_harmonic_anchor_values() {
        assert_eq!(harmonic_score(key("8A"), key("8A")), SAME_KEY);
        assert_eq!(harmonic_score(key("8A"), key("9A")), ADJACENT_KEY);
        assert_eq!(harmonic_score(key("12B"), key("1B")), ADJACENT_KEY);
        assert_eq!(harmonic_score(key("8A"), key("8B")), RELATIVE_KEY);
        assert!((harmonic_score(key("8A"), key("9B")) - DECAY_START).abs() < 1e-9);
        assert!((harmonic_score(key("8A"), key("2A")) - HARMONIC_FLOOR).abs() < 1e-9);
        assert!((harmonic_score(key("8A"), key("2B")) - HARMONIC_FLOOR).abs() < 1e-9);
        assert_eq!(harmonic_score(None, key("8A")), UNKNOWN_KEY);
    }

    #[test]
    fn test_harmonic_decays_with_distance() {
        let from = key("1A");
        let scores: Vec<f64> = (1..=7u8)
            .map(|n| harmonic_score(from, CamelotKey::new(n, Mode::Minor)))
            .collect();
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1], "not decaying: {:?}", scores);
        }
        assert!(scores[2] > HARMONIC_FLOOR);
    }

    #[test]
    fn test_harmonic_wheel_symmetry() {
        let all: Vec<CamelotKey> = (1..=12u8)
            .flat_map(|n| [Mode::Minor, Mode::Major].map(|m| CamelotKey::new(n, m).unwrap()))
            .collect();
        for a in &all {
            for b in &all {
                assert_eq!(harmonic_score(Some(*a), Some(*b)), harmonic_score(Some(*b), Some(*a)));
            }
        }
    }

    #[test]
    fn test_tempo_identical_and_close() {
        let c = cfg();
        assert_eq!(tempo_score(128.0, 128.0, &c), 1.0);
        let close = tempo_score(128.0, 129.0, &c);
        assert!(close > 0.95 && close < 1.0);
        assert!(tempo_score(128.0, 132.0, &c) < close);
    }

    #[test]
    fn test_tempo_double_and_half_time() {
        let c = cfg();
        assert!((tempo_score(70.0, 140.0, &c) - c.half_double_factor).abs() < 1e-9);
        assert!((tempo_score(140.0, 70.0, &c) - c.half_double_factor).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_beyond_tolerance_vanishes() {
        let c = cfg();
        assert_eq!(tempo_score(128.0, 95.0, &c), 0.0);
        assert_eq!(tempo_score(100.0, 150.0, &c), 0.0);
        assert_eq!(tempo_score(100.0, 107.0, &c), 0.0);
        assert_eq!(tempo_score(0.0, 120.0, &c), UNKNOWN_TEMPO);
    }

    #[test]
    fn test_tempo_symmetric() {
        let c = cfg();
        for (a, b) in [(120.0, 124.0), (128.0, 63.0), (90.0, 95.0)] {
            assert!((tempo_score(a, b, &c) - tempo_score(b, a, &c)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_energy_rise_penalized_less_than_drop() {
        let c = cfg();
        let rise = energy_score(0.4, 0.7, &c);
        let drop = energy_score(0.7, 0.4, &c);
        assert!(rise > drop);
        assert_eq!(energy_score(0.5, 0.5, &c), 1.0);
        assert_eq!(energy_score(1.0, 0.0, &c), 0.0);
    }

    #[test]
    fn test_structure_rewards_clean_points() {
        let c = cfg();
        let clean = structure_score(
            &point(1, MixRole::Exit, Some(SectionKind::Outro), VocalDensity::None),
            &point(0, MixRole::Entry, Some(SectionKind::Intro), VocalDensity::None),
            &c,
        );
        let busy = structure_score(
            &point(1, MixRole::Exit, Some(SectionKind::Chorus), VocalDensity::Light),
            &point(0, MixRole::Entry, Some(SectionKind::Verse), VocalDensity::Light),
            &c,
        );
        assert!((clean - 1.0).abs() < 1e-9);
        assert!(busy < clean);
    }

    #[test]
    fn test_structure_penalizes_vocal_collision() {
        let c = cfg();
        let exit = point(1, MixRole::Exit, Some(SectionKind::Chorus), VocalDensity::Heavy);
        let entry_heavy = point(0, MixRole::Entry, Some(SectionKind::Chorus), VocalDensity::Heavy);
        let entry_light = point(0, MixRole::Entry, Some(SectionKind::Chorus), VocalDensity::Light);
        let clash = structure_score(&exit, &entry_heavy, &c);
        let no_clash = structure_score(&exit, &entry_light, &c);
        assert!(no_clash - clash > c.vocal_clash_penalty);
    }

    #[test]
    fn test_same_key_and_tempo_is_harmonic_blend() {
        let c = cfg();
        let a = structured_track("a", 128.0, "8A");
        let b = structured_track("b", 128.0, "8A");
        let pc = PlannerConfig::default();
        let best = best_transition(&a, &plan(&a, &pc), &b, &plan(&b, &pc), &c).unwrap();
        assert_eq!(best.kind, TransitionType::HarmonicBlend);
        assert!(best.viable);
        assert_eq!(best.exit.section, Some(SectionKind::Outro));
        assert_eq!(best.entry.section, Some(SectionKind::Intro));
        assert!(best.rationale.contains("same key"));
    }

    #[test]
    fn test_incompatible_pair_still_scored() {
        let c = cfg();
        let pc = PlannerConfig::default();
        let a = track("a", 128.0, "8A", 200_000);
        let b = track("b", 64.0 * 1.5, "2B", 200_000);
        let best = best_transition(&a, &plan(&a, &pc), &b, &plan(&b, &pc), &c).unwrap();
        assert!(!best.viable);
        assert_eq!(best.kind, TransitionType::Cut);
        assert!(best.score < c.min_viable_score);
        assert!(best.score > 0.0);
        assert!(best.rationale.starts_with("incompatible"));
    }

    #[test]
    fn test_identical_key_tempo_dominates_harmonic_tempo() {
        let c = cfg();
        let base = track("a", 124.0, "5A", 200_000);
        let same = harmonic_score(base.camelot(), key("5A")) * c.weights.harmonic
            + tempo_score(124.0, 124.0, &c) * c.weights.tempo;
        for (k, bpm) in [("5A", 125.0), ("6A", 124.0), ("5B", 124.0), ("11B", 62.0), ("4A", 120.0)] {
            let other = harmonic_score(base.camelot(), key(k)) * c.weights.harmonic
                + tempo_score(124.0, bpm, &c) * c.weights.tempo;
            assert!(same > other, "{k} @ {bpm} scored {other} >= {same}");
        }
    }

    #[test]
    fn test_best_transition_tie_prefers_confidence_then_earlier_exit() {
        let c = cfg();
        let a = track("a", 128.0, "8A", 200_000);
        let b = track("b", 128.0, "8A", 200_000);

        let mut low = point(150_000, MixRole::Exit, None, VocalDensity::None);
        low.confidence = 0.2;
        let high = point(160_000, MixRole::Exit, None, VocalDensity::None);
        let entry = point(0, MixRole::Entry, None, VocalDensity::None);

        let from_plan = MixPlan { exits: vec![low.clone(), high.clone()], entries: vec![] };
        let to_plan = MixPlan { exits: vec![], entries: vec![entry.clone()] };
        let best = best_transition(&a, &from_plan, &b, &to_plan, &c).unwrap();
        assert_eq!(best.exit.ms, 160_000);

        // Identical points apart from timestamp: earlier exit wins
        let mut later = high.clone();
        later.ms = 170_000;
        let from_plan = MixPlan { exits: vec![later, high], entries: vec![] };
        let best = best_transition(&a, &from_plan, &b, &to_plan, &c).unwrap();
        assert_eq!(best.exit.ms, 160_000);
    }

    #[test]
    fn test_best_transition_empty_plan() {
        let c = cfg();
        let a = track("a", 128.0, "8A", 200_000);
        assert!(best_transition(&a, &MixPlan::default(), &a, &MixPlan::default(), &c).is_none());
    }

    #[test]
    fn test_classification_bands() {
        let c = cfg();
        let strong = SubScores { harmonic: 1.0, tempo: 1.0, energy: 1.0, structure: 1.0 };
        let off_key = SubScores { harmonic: 0.5, ..strong };
        assert_eq!(classify(90.0, &strong, &c), TransitionType::HarmonicBlend);
        assert_eq!(classify(90.0, &off_key, &c), TransitionType::Crossfade);
        assert_eq!(classify(65.0, &strong, &c), TransitionType::Crossfade);
        assert_eq!(classify(45.0, &strong, &c), TransitionType::Cut);
        assert_eq!(classify(10.0, &strong, &c), TransitionType::Cut);
    }

    #[test]
    fn test_tempo_label() {
        let c = cfg();
        assert_eq!(tempo_label(128.0, 129.28, &c), "+1.0%");
        assert_eq!(tempo_label(70.0, 140.0, &c), "double time");
        assert_eq!(tempo_label(140.0, 70.0, &c), "half time");
        assert_eq!(tempo_label(0.0, 70.0, &c), "unknown tempo");
    }
}
