//! Emotion categories and label aggregation.
//!
//! Emotion models emit probabilities over many fine-grained labels (GoEmotions
//! has 28). This module folds those labels onto five outward-facing categories
//! and picks the category with the largest aggregated mass.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// One of the five outward-facing emotion categories.
///
/// Declaration order is the tie-break priority used by [`aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Happy,
    Sad,
    Angry,
    Anxious,
    Neutral,
}

impl Category {
    /// All categories in priority order
    pub const ALL: [Category; 5] = [
        Category::Happy,
        Category::Sad,
        Category::Angry,
        Category::Anxious,
        Category::Neutral,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Happy => "Happy",
            Category::Sad => "Sad",
            Category::Angry => "Angry",
            Category::Anxious => "Anxious",
            Category::Neutral => "Neutral",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accumulated probability mass per category.
///
/// Always holds all five categories. Serializes as a JSON object with keys in
/// priority order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CategoryScores([f64; 5]);

impl CategoryScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: Category) -> f64 {
        self.0[category.index()]
    }

    pub fn add(&mut self, category: Category, mass: f64) {
        self.0[category.index()] += mass;
    }

    /// Iterate `(category, score)` pairs in priority order
    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        Category::ALL.iter().map(move |c| (*c, self.get(*c)))
    }

    /// Category with the largest score; the earliest category wins ties.
    pub fn top(&self) -> Category {
        let mut best = Category::ALL[0];
        for category in Category::ALL.iter().skip(1) {
            if self.get(*category) > self.get(best) {
                best = *category;
            }
        }
        best
    }
}

impl Serialize for CategoryScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Category::ALL.len()))?;
        for (category, score) in self.iter() {
            map.serialize_entry(category.name(), &score)?;
        }
        map.end()
    }
}

/// Labels mapped directly to a category
const EXACT_LABELS: &[(&str, Category)] = &[
    ("joy", Category::Happy),
    ("sadness", Category::Sad),
    ("anger", Category::Angry),
    ("anxiety", Category::Anxious),
    ("fear", Category::Anxious),
    ("neutral", Category::Neutral),
];

/// Substring rules tried in order when no exact label matches
const SUBSTRING_RULES: &[(&[&str], Category)] = &[
    (
        &["joy", "love", "amuse", "gratitude", "excit", "glad"],
        Category::Happy,
    ),
    (&["sad", "grief", "disappoint"], Category::Sad),
    (&["anger", "annoy", "resent"], Category::Angry),
    (
        &["anx", "worr", "fear", "stress", "nervous"],
        Category::Anxious,
    ),
    (&["neutral"], Category::Neutral),
];

/// Resolve a raw model label to a category.
///
/// Matching is case-insensitive. Returns `None` for labels no rule covers;
/// their mass is dropped by [`aggregate`].
pub fn resolve_label(label: &str) -> Option<Category> {
    let name = label.to_lowercase();

    if let Some((_, category)) = EXACT_LABELS.iter().find(|(exact, _)| *exact == name) {
        return Some(*category);
    }

    SUBSTRING_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| name.contains(needle)))
        .map(|(_, category)| *category)
}

/// Fold a label distribution onto the five categories.
///
/// Returns the winning category along with the full score table. An empty
/// distribution, or one where nothing resolves, yields all zeros and `Happy`.
pub fn aggregate<'a, I>(distribution: I) -> (Category, CategoryScores)
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut scores = CategoryScores::new();

    for (label, probability) in distribution {
        match resolve_label(label) {
            Some(category) => scores.add(category, probability),
            None => tracing::trace!("Dropping unmapped emotion label: {}", label),
        }
    }

    (scores.top(), scores)
}
