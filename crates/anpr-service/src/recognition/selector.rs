use regex::{Regex, RegexBuilder};

use super::{BestMatch, Candidate, Reading, Recognition, SelectionPolicy};

/// Shape a normalized string must have, from its first character, to count as
/// a plate under [`SelectionPolicy::BestMatch`].
#[derive(Debug, Clone)]
pub struct PlateShape {
    regex: Regex,
}

impl PlateShape {
    /// One to three letters, an optional space, one to four digits
    pub const DEFAULT_PATTERN: &'static str = r"[A-Za-z]{1,3}\s?\d{1,4}";

    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self { regex })
    }

    /// True when a match starts at offset 0. Trailing characters are allowed.
    pub fn matches(&self, text: &str) -> bool {
        self.regex.find(text).is_some_and(|m| m.start() == 0)
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl Default for PlateShape {
    fn default() -> Self {
        #[allow(clippy::expect_used)]
        Self::new(Self::DEFAULT_PATTERN).expect("default plate pattern compiles")
    }
}

/// Turns per-box readings into a [`Recognition`].
#[derive(Debug, Clone, Default)]
pub struct CandidateSelector {
    shape: PlateShape,
    separator: String,
}

impl CandidateSelector {
    pub fn new(shape: PlateShape, separator: impl Into<String>) -> Self {
        Self {
            shape,
            separator: separator.into(),
        }
    }

    pub fn shape(&self) -> &PlateShape {
        &self.shape
    }

    /// `per_box` holds the readings of each box, in detection order
    pub fn select(&self, policy: SelectionPolicy, per_box: &[Vec<Reading>]) -> Recognition {
        match policy {
            SelectionPolicy::Concatenate => Recognition::Plates {
                plates: self.concatenate(per_box),
            },
            SelectionPolicy::BestMatch => Recognition::Best(self.best_match(per_box)),
        }
    }

    /// One string per box that produced any text: its normalized fragments
    /// joined in reading order.
    pub fn concatenate(&self, per_box: &[Vec<Reading>]) -> Vec<String> {
        per_box
            .iter()
            .filter_map(|readings| {
                let fragments: Vec<String> = readings
                    .iter()
                    .filter_map(Candidate::from_reading)
                    .map(|c| c.text)
                    .collect();
                (!fragments.is_empty()).then(|| fragments.join(&self.separator))
            })
            .collect()
    }

    /// Highest-confidence plate-shaped candidate across all boxes. Ties keep
    /// the earliest candidate.
    pub fn best_match(&self, per_box: &[Vec<Reading>]) -> BestMatch {
        let mut best: Option<Candidate> = None;

        for candidate in per_box
            .iter()
            .flatten()
            .filter_map(Candidate::from_reading)
            .filter(|c| c.confidence.is_finite() && self.shape.matches(&c.text))
        {
            let better = best
                .as_ref()
                .map_or(true, |current| candidate.confidence > current.confidence);
            if better {
                best = Some(candidate);
            }
        }

        best.map(BestMatch::from).unwrap_or_else(BestMatch::none)
    }
}
