//! The tier gate.

use thiserror::Error;

use super::types::{Feature, FeatureSet, Tier};

/// Rejection from the tier gate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TierError {
    /// One or more requested features exceed the tier's entitlement.
    #[error("features not permitted for tier {tier}: {}", join(.disallowed))]
    FeatureNotAllowed {
        tier: Tier,
        disallowed: Vec<Feature>,
    },

    /// Nothing was requested.
    #[error("no features requested")]
    NoFeaturesRequested,
}

fn join(features: &[Feature]) -> String {
    features
        .iter()
        .map(Feature::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Features a tier may request.
pub fn allowed_features(tier: Tier) -> &'static [Feature] {
    match tier {
        Tier::Basic => &[Feature::Outline],
        Tier::Standard => &[Feature::Outline, Feature::Narration],
        Tier::Premium => &[Feature::Outline, Feature::Narration, Feature::Audio],
    }
}

/// Check a feature request against a tier.
///
/// On rejection the error lists every disallowed feature so the caller can
/// report all of them at once.
pub fn validate(tier: Tier, features: &FeatureSet) -> Result<(), TierError> {
    if features.is_empty() {
        return Err(TierError::NoFeaturesRequested);
    }

    let allowed = allowed_features(tier);
    let disallowed: Vec<Feature> = features.iter().filter(|f| !allowed.contains(f)).collect();

    if disallowed.is_empty() {
        Ok(())
    } else {
        Err(TierError::FeatureNotAllowed { tier, disallowed })
    }
}
