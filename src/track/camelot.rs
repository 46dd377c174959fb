//! Camelot wheel notation and harmonic distance.
//!
//! - Numbers 1-12 are positions on the wheel (adjacent = a fifth apart)
//! - 'A' suffix = minor key, 'B' suffix = major key
//! - Same number, other letter = relative major/minor

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Longest step count between two numbers on the wheel.
pub const MAX_WHEEL_STEPS: u8 = 6;

static CAMELOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(1[0-2]|0?[1-9])\s*([AB])\s*$").expect("valid Camelot regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Minor,
    Major,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CamelotKey {
    number: u8,
    mode: Mode,
}

impl CamelotKey {
    /// Build a key from its wheel position. Returns None outside 1-12.
    pub fn new(number: u8, mode: Mode) -> Option<Self> {
        (1..=12).contains(&number).then_some(Self { number, mode })
    }

    /// Parse "8A", "12b", " 3B ". Anything else is None.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = CAMELOT_RE.captures(raw)?;
        let number: u8 = caps[1].parse().ok()?;
        let mode = match caps[2].to_ascii_uppercase().as_str() {
            "A" => Mode::Minor,
            _ => Mode::Major,
        };
        Self::new(number, mode)
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn letter(&self) -> char {
        match self.mode {
            Mode::Minor => 'A',
            Mode::Major => 'B',
        }
    }

    /// Shortest number of steps around the wheel (0-6), ignoring mode.
    pub fn steps_to(&self, other: &CamelotKey) -> u8 {
        let diff = self.number.abs_diff(other.number);
        diff.min(12 - diff)
    }

    /// Move `delta` positions around the wheel, keeping the mode.
    pub fn rotate(&self, delta: i32) -> CamelotKey {
        let number = ((self.number as i32 - 1 + delta).rem_euclid(12) + 1) as u8;
        CamelotKey { number, mode: self.mode }
    }

    /// Same number, opposite letter.
    pub fn relative(&self) -> CamelotKey {
        let mode = match self.mode {
            Mode::Minor => Mode::Major,
            Mode::Major => Mode::Minor,
        };
        CamelotKey { number: self.number, mode }
    }

    /// Keys that are safe to mix into: same, +1/-1, relative major/minor.
    pub fn compatible_keys(&self) -> Vec<CamelotKey> {
        vec![*self, self.rotate(1), self.rotate(-1), self.relative()]
    }

    /// Open Key notation: 'm' for minor, 'd' for major. Open Key numbers its
    /// wheel from C major / A minor, so Camelot 8 is Open Key 1.
    pub fn open_key(&self) -> String {
        let number = (self.number + 4) % 12 + 1;
        match self.mode {
            Mode::Minor => format!("{}m", number),
            Mode::Major => format!("{}d", number),
        }
    }

    /// How the two keys relate, as a short label for rationale strings.
    pub fn relation(&self, other: &CamelotKey) -> &'static str {
        let steps = self.steps_to(other);
        let same_mode = self.mode == other.mode;
        match (steps, same_mode) {
            (0, true) => "same key",
            (0, false) => "relative major/minor",
            (1, true) => "adjacent on wheel",
            (1, false) => "diagonal",
            (2, true) => "two steps",
            (s, _) if s >= MAX_WHEEL_STEPS => "opposite side of wheel",
            _ => "distant",
        }
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.letter())
    }
}
