use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// The file is optional; every field has a default.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    pub planner: PlannerConfig,
    pub scoring: ScoringConfig,
    pub search: SearchConfig,
}

/// Everything the engine needs for one planning request.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub planner: PlannerConfig,
    pub scoring: ScoringConfig,
    pub search: SearchConfig,
}

/// Mix point generation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Candidates kept per role (EXIT / ENTRY), best confidence first.
    pub max_points_per_role: usize,
    /// Anchors within this many beats of a downbeat are snapped onto it.
    pub snap_tolerance_beats: f64,
    /// Half-width of the window inspected for vocals around an anchor.
    pub vocal_window_ms: u64,
    /// Fraction of the vocal window that counts as heavy vocals.
    pub heavy_vocal_ratio: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_points_per_role: 4,
            snap_tolerance_beats: 1.0,
            vocal_window_ms: 4_000,
            heavy_vocal_ratio: 0.5,
        }
    }
}

/// Relative importance of each sub-score. Renormalized to sum to 1.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub harmonic: f64,
    pub tempo: f64,
    pub energy: f64,
    pub structure: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            harmonic: 0.35,
            tempo: 0.35,
            energy: 0.15,
            structure: 0.15,
        }
    }
}

impl ScoringWeights {
    /// Scale weights to sum to 1. Negative weights count as zero; an
    /// all-zero set falls back to the defaults.
    pub fn normalized(&self) -> Self {
        let parts = [self.harmonic, self.tempo, self.energy, self.structure].map(|w| w.max(0.0));
        let total: f64 = parts.iter().sum();
        if total <= f64::EPSILON {
            log::warn!("All scoring weights are zero, using defaults");
            return Self::default();
        }
        Self {
            harmonic: parts[0] / total,
            tempo: parts[1] / total,
            energy: parts[2] / total,
            structure: parts[3] / total,
        }
    }
}

/// Transition scoring settings. Scores land on a 0-100 scale.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    /// Relative tempo deviation at which tempo compatibility reaches zero.
    pub tempo_tolerance: f64,
    /// Multiplier applied when tempos only match at double or half time.
    pub half_double_factor: f64,
    /// Energy penalty per unit of energy rise.
    pub rise_penalty: f64,
    /// Energy penalty per unit of energy drop.
    pub drop_penalty: f64,
    /// Structure sub-score deducted when both points sit in heavy vocals.
    pub vocal_clash_penalty: f64,
    /// Below this score a pairing is incompatible.
    pub min_viable_score: f64,
    /// At or above this score a pairing can crossfade.
    pub crossfade_score: f64,
    /// At or above this score, with strong key and tempo match, a pairing
    /// can be blended harmonically.
    pub harmonic_blend_score: f64,
    /// Minimum harmonic sub-score for a harmonic blend.
    pub blend_min_harmonic: f64,
    /// Minimum tempo sub-score for a harmonic blend.
    pub blend_min_tempo: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            tempo_tolerance: 0.06,
            half_double_factor: 0.9,
            rise_penalty: 0.5,
            drop_penalty: 1.0,
            vocal_clash_penalty: 0.4,
            min_viable_score: 40.0,
            crossfade_score: 60.0,
            harmonic_blend_score: 80.0,
            blend_min_harmonic: 0.9,
            blend_min_tempo: 0.9,
        }
    }
}

/// Sequence search settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Open states kept in the frontier. 0 = unbounded (exact, but
    /// combinatorial on large pools); smaller values trade optimality for
    /// speed.
    pub frontier_width: usize,
    /// Node expansions before the search completes its best open state
    /// greedily.
    pub max_expansions: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            frontier_width: 512,
            max_expansions: 200_000,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/mixplan/config.toml`.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path.
    /// Logs a warning if the file can't be read or parsed and uses defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Engine settings with scoring weights normalized.
    pub fn engine(&self) -> EngineConfig {
        let mut scoring = self.scoring.clone();
        scoring.weights = scoring.weights.normalized();
        EngineConfig {
            planner: self.planner.clone(),
            scoring,
            search: self.search.clone(),
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
