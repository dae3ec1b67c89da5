use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Decision boundary on the classifier's P(dog) output.
pub const DOG_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Cat,
    Dog,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Cat => "cat",
            Label::Dog => "dog",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Ground truth must be 'cat' or 'dog', got '{0}'")]
pub struct ParseLabelError(pub String);

impl FromStr for Label {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cat" => Ok(Label::Cat),
            "dog" => Ok(Label::Dog),
            other => Err(ParseLabelError(other.to_string())),
        }
    }
}

/// A classifier score interpreted as a label.
///
/// `confidence` is the probability of the chosen label, so it never drops
/// below one half.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: Label,
    pub confidence: f32,
    pub raw_score: f32,
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("classifier returned a non-finite score: {0}")]
pub struct InvalidScore(pub f32);

impl Classification {
    pub fn from_score(score: f32) -> Result<Self, InvalidScore> {
        if !score.is_finite() {
            return Err(InvalidScore(score));
        }
        let score = score.clamp(0.0, 1.0);

        let (label, confidence) = if score > DOG_THRESHOLD {
            (Label::Dog, score)
        } else {
            (Label::Cat, 1.0 - score)
        };

        Ok(Self {
            label,
            confidence,
            raw_score: score,
        })
    }
}
