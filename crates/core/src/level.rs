//! Canonical proficiency levels.
//!
//! A learner's level is stored in exactly one representation: the ordinal
//! code 1 through 6. The `HSK{n}` label used by the vocabulary files and the
//! dashboard is a presentation form, converted at the boundary and never
//! persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A proficiency level in the canonical domain `1..=6`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    pub const MIN: Level = Level(1);
    pub const MAX: Level = Level(6);

    /// Builds a level, rejecting values outside the canonical domain.
    pub fn new(value: u8) -> Option<Level> {
        (Self::MIN.0..=Self::MAX.0).contains(&value).then_some(Level(value))
    }

    /// Builds a level by clamping into the canonical domain.
    ///
    /// Out-of-range assessments are clamped, not rejected.
    pub fn clamped(value: i64) -> Level {
        Level(value.clamp(Self::MIN.0 as i64, Self::MAX.0 as i64) as u8)
    }

    /// The canonical numeric code.
    pub fn get(self) -> u8 {
        self.0
    }

    /// The display label, e.g. `HSK4`.
    pub fn label(self) -> String {
        format!("HSK{}", self.0)
    }

    /// Parses either the display label (`HSK4`) or the bare numeric form.
    pub fn from_label(text: &str) -> Option<Level> {
        let text = text.trim();
        let digits = text
            .strip_prefix("HSK")
            .or_else(|| text.strip_prefix("hsk"))
            .unwrap_or(text)
            .trim();
        digits.parse::<u8>().ok().and_then(Level::new)
    }

    /// The next level down, if any. Used by the vocabulary fallback, which
    /// broadens downward and never upward.
    pub fn lower(self) -> Option<Level> {
        (self.0 > Self::MIN.0).then(|| Level(self.0 - 1))
    }

    /// All levels in ascending order.
    pub fn all() -> impl Iterator<Item = Level> {
        (Self::MIN.0..=Self::MAX.0).map(Level)
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::MIN
    }
}

impl From<u8> for Level {
    fn from(value: u8) -> Self {
        Level::clamped(value as i64)
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range() {
        assert!(Level::new(0).is_none());
        assert!(Level::new(7).is_none());
        assert_eq!(Level::new(3), Some(Level::clamped(3)));
    }

    #[test]
    fn clamps_into_domain() {
        assert_eq!(Level::clamped(-2).get(), 1);
        assert_eq!(Level::clamped(0).get(), 1);
        assert_eq!(Level::clamped(9).get(), 6);
        assert_eq!(Level::clamped(4).get(), 4);
    }

    #[test]
    fn label_round_trip_is_identity() {
        for level in Level::all() {
            assert_eq!(Level::from_label(&level.label()), Some(level));
        }
    }

    #[test]
    fn from_label_accepts_bare_numbers() {
        assert_eq!(Level::from_label("4"), Some(Level::clamped(4)));
        assert_eq!(Level::from_label(" hsk2 "), Some(Level::clamped(2)));
        assert_eq!(Level::from_label("HSK9"), None);
        assert_eq!(Level::from_label("beginner"), None);
    }

    #[test]
    fn lower_stops_at_minimum() {
        assert_eq!(Level::MIN.lower(), None);
        assert_eq!(Level::clamped(3).lower(), Some(Level::clamped(2)));
    }

    #[test]
    fn serde_uses_canonical_numeric_form() {
        let level = Level::clamped(5);
        assert_eq!(serde_json::to_string(&level).unwrap(), "5");
        let parsed: Level = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, Level::clamped(2));
    }
}
