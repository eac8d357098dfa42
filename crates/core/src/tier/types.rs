//! Tier and feature types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Caller entitlement level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Outline only.
    Basic,
    /// Outline and narration.
    Standard,
    /// Every feature, including audio.
    Premium,
}

impl Tier {
    /// All tiers, lowest first.
    pub const ALL: [Tier; 3] = [Tier::Basic, Tier::Standard, Tier::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Standard => "standard",
            Tier::Premium => "premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Tier::Basic),
            "standard" => Ok(Tier::Standard),
            "premium" => Ok(Tier::Premium),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

/// A pipeline feature a caller may request. Each feature maps to one stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Outline,
    Narration,
    Audio,
}

impl Feature {
    /// Features in fixed pipeline order.
    pub const ALL: [Feature; 3] = [Feature::Outline, Feature::Narration, Feature::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Outline => "outline",
            Feature::Narration => "narration",
            Feature::Audio => "audio",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "outline" | "slides" => Ok(Feature::Outline),
            "narration" | "script" => Ok(Feature::Narration),
            "audio" => Ok(Feature::Audio),
            other => Err(format!("unknown feature: {}", other)),
        }
    }
}

/// An ordered, duplicate-free set of requested features.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "Vec<Feature>", into = "Vec<Feature>")]
pub struct FeatureSet(Vec<Feature>);

impl FeatureSet {
    pub fn new(features: impl IntoIterator<Item = Feature>) -> Self {
        let mut items: Vec<Feature> = features.into_iter().collect();
        items.sort();
        items.dedup();
        Self(items)
    }

    /// Every feature.
    pub fn all() -> Self {
        Self::new(Feature::ALL)
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.0.iter().copied()
    }

    /// The latest feature in pipeline order.
    pub fn last(&self) -> Option<Feature> {
        self.0.last().copied()
    }
}

impl From<Vec<Feature>> for FeatureSet {
    fn from(features: Vec<Feature>) -> Self {
        Self::new(features)
    }
}

impl From<FeatureSet> for Vec<Feature> {
    fn from(set: FeatureSet) -> Self {
        set.0
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Feature::as_str).collect();
        write!(f, "{}", names.join(","))
    }
}
