use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::Track;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON track file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid YAML track file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Unsupported track file extension '{0}' (expected .json, .yaml or .yml)")]
    UnsupportedFormat(String),
}

/// Accept either a bare list of tracks or `{ "tracks": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum TrackFile {
    List(Vec<Track>),
    Wrapped { tracks: Vec<Track> },
}

impl TrackFile {
    fn into_tracks(self) -> Vec<Track> {
        match self {
            TrackFile::List(tracks) | TrackFile::Wrapped { tracks } => tracks,
        }
    }
}

/// Load feature records from a JSON or YAML file, picked by extension.
/// Timing data is normalized and every correction is logged.
pub fn load_tracks(path: &Path) -> Result<Vec<Track>, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let tracks = match ext.as_str() {
        "json" => parse_json(&std::fs::read_to_string(path)?)?,
        "yaml" | "yml" => parse_yaml(&std::fs::read_to_string(path)?)?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };

    log::info!("Loaded {} tracks from {}", tracks.len(), path.display());
    Ok(tracks)
}

pub fn parse_json(contents: &str) -> Result<Vec<Track>, LoadError> {
    let file: TrackFile = serde_json::from_str(contents)?;
    Ok(normalize_all(file.into_tracks()))
}

pub fn parse_yaml(contents: &str) -> Result<Vec<Track>, LoadError> {
    let file: TrackFile = serde_yaml::from_str(contents)?;
    Ok(normalize_all(file.into_tracks()))
}

fn normalize_all(mut tracks: Vec<Track>) -> Vec<Track> {
    for track in &mut tracks {
        for fix in track.normalize() {
            log::warn!("Track {}: {}", track.id, fix);
        }
    }
    tracks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::SectionKind;

    #[test]
    fn test_parse_json_list() {
        let json = r#"[
            {"id": "t1", "bpm": 128.0, "key": "8A", "energy": 0.7, "duration_ms": 200000,
             "downbeats": [1875, 0],
             "segments": [{"kind": "outro", "start_ms": 170000, "end_ms": 200000}]}
        ]"#;
        let tracks = parse_json(json).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].downbeats, vec![0, 1875]);
        assert_eq!(tracks[0].segments[0].kind, SectionKind::Outro);
        assert!(tracks[0].vocals.is_empty());
    }

    #[test]
    fn test_parse_json_wrapped() {
        let json = r#"{"tracks": [
            {"id": "t1", "bpm": 128.0, "key": "8A", "energy": 0.7, "duration_ms": 200000},
            {"id": "t2", "bpm": 126.0, "key": "9A", "energy": 0.6, "duration_ms": 180000}
        ]}"#;
        let tracks = parse_json(json).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].id, "t2");
    }

    #[test]
    fn test_parse_yaml_build_up_alias() {
        let yaml = "
- id: t1
  bpm: 124
  key: 5B
  energy: 0.5
  duration_ms: 300000
  segments:
    - { kind: build-up, start_ms: 60000, end_ms: 75000, energy: 0.8 }
  vocals:
    - { start_ms: 10000, end_ms: 20000 }
";
        let tracks = parse_yaml(yaml).unwrap();
        assert_eq!(tracks[0].segments[0].kind, SectionKind::BuildUp);
        assert_eq!(tracks[0].segments[0].energy, Some(0.8));
        assert_eq!(tracks[0].vocals.len(), 1);
    }

    #[test]
    fn test_parse_json_missing_required_field() {
        let json = r#"[{"id": "t1", "key": "8A", "energy": 0.7, "duration_ms": 1000}]"#;
        assert!(matches!(parse_json(json), Err(LoadError::Json(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_tracks(Path::new("/nonexistent/tracks.csv"));
        assert!(matches!(err, Err(LoadError::UnsupportedFormat(ref e)) if e == "csv"));

        let err = load_tracks(Path::new("/nonexistent/tracks.json"));
        assert!(matches!(err, Err(LoadError::Io(_))));
    }
}
