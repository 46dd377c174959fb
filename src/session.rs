//! The externally consumed result of a planning request.

use serde::Serialize;

use crate::scoring::TransitionType;
use crate::sequence::pairs::PairTable;
use crate::track::Track;

/// An ordered DJ set with the transition into every track after the first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub tracks: Vec<SessionEntry>,
    pub total_score: f64,
    pub avg_transition_score: f64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    /// Zero-based index in the set.
    pub position: usize,
    pub track: TrackRef,
    /// None for the opening track.
    pub transition: Option<TransitionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRef {
    pub id: String,
    pub hash: String,
    pub title: String,
    pub bpm: f64,
    pub key: String,
    pub energy: f64,
    pub duration_ms: u64,
}

impl From<&Track> for TrackRef {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            hash: track.hash.clone(),
            title: track.title.clone(),
            bpm: track.bpm,
            key: track.key.clone(),
            energy: track.energy,
            duration_ms: track.duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionSummary {
    #[serde(rename = "type")]
    pub kind: TransitionType,
    pub exit_point_ms: u64,
    pub entry_point_ms: u64,
    pub score: f64,
    pub description: String,
}

impl Session {
    /// A session with no tracks. Callers treat this as a planning failure.
    pub fn empty(warnings: Vec<String>) -> Self {
        Self {
            tracks: Vec::new(),
            total_score: 0.0,
            avg_transition_score: 0.0,
            warnings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn track_ids(&self) -> Vec<&str> {
        self.tracks.iter().map(|e| e.track.id.as_str()).collect()
    }
}

/// Turn a search result into a session. `order` indexes `tracks`, and
/// `pairs` must have been built over the same slice. Transitions below the
/// viability threshold are forced to a CUT and reported in `warnings`,
/// which are otherwise carried through unchanged.
pub fn assemble(
    tracks: &[&Track],
    order: &[usize],
    pairs: &PairTable,
    mut warnings: Vec<String>,
) -> Session {
    let mut entries = Vec::with_capacity(order.len());
    let mut total_score = 0.0;
    let mut transitions = 0usize;

    for (position, &idx) in order.iter().enumerate() {
        let track = tracks[idx];
        let transition = match position.checked_sub(1).map(|p| order[p]) {
            None => None,
            Some(prev) => match pairs.get(prev, idx) {
                Some(candidate) => {
                    total_score += candidate.score;
                    transitions += 1;

                    let (kind, description) = if candidate.viable {
                        (candidate.kind, candidate.rationale.clone())
                    } else {
                        let msg = format!(
                            "no transition above threshold found between {} and {}; used fallback CUT",
                            tracks[prev].id, track.id
                        );
                        log::warn!("{} (score {:.1})", msg, candidate.score);
                        warnings.push(msg);
                        (
                            TransitionType::Cut,
                            format!("fallback CUT; {}", candidate.rationale),
                        )
                    };

                    Some(TransitionSummary {
                        kind,
                        exit_point_ms: candidate.exit.ms,
                        entry_point_ms: candidate.entry.ms,
                        score: candidate.score,
                        description,
                    })
                }
                None => {
                    let msg = format!(
                        "no mix points available between {} and {}",
                        tracks[prev].id, track.id
                    );
                    log::warn!("{}", msg);
                    warnings.push(msg);
                    None
                }
            },
        };

        entries.push(SessionEntry {
            position,
            track: TrackRef::from(track),
            transition,
        });
    }

    let avg_transition_score = if transitions > 0 {
        total_score / transitions as f64
    } else {
        0.0
    };

    Session {
        tracks: entries,
        total_score,
        avg_transition_score,
        warnings,
    }
}
