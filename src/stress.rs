//! Stress score derived from a three-class sentiment distribution.

/// Weight applied to the negative probability
const NEGATIVE_WEIGHT: f64 = 70.0;
/// Weight applied to the neutral probability
const NEUTRAL_WEIGHT: f64 = 40.0;
/// Weight applied to the absence of positivity (1 - positive)
const NOT_POSITIVE_WEIGHT: f64 = 10.0;

/// Sentiment probabilities in the model's (negative, neutral, positive) order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentDistribution {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl SentimentDistribution {
    pub fn new(negative: f64, neutral: f64, positive: f64) -> Self {
        Self {
            negative,
            neutral,
            positive,
        }
    }

    /// Build from probabilities indexed 0 = negative, 1 = neutral, 2 = positive.
    ///
    /// Returns `None` unless exactly three values are given.
    pub fn from_indexed(probs: &[f64]) -> Option<Self> {
        match probs {
            [negative, neutral, positive] => Some(Self::new(*negative, *neutral, *positive)),
            _ => None,
        }
    }
}

/// Map a sentiment distribution to an integer stress score in `[0, 100]`.
///
/// `raw = 70*neg + 40*neu + 10*(1 - pos)`, clamped, then rounded half to even.
pub fn estimate(sentiment: &SentimentDistribution) -> u8 {
    let raw = NEGATIVE_WEIGHT * sentiment.negative
        + NEUTRAL_WEIGHT * sentiment.neutral
        + NOT_POSITIVE_WEIGHT * (1.0 - sentiment.positive);

    raw.clamp(0.0, 100.0).round_ties_even() as u8
}
