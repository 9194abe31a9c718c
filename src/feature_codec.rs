//! Feature encoding for profile classifier inference.
//!
//! This module turns raw profile attributes into the numeric vector the
//! trained models expect. The layout and the transforms are versioned
//! together as a [`FeatureSchema`]; adding a feature means bumping the
//! version, never reordering the existing slots.

use crate::error::SchemaError;
use crate::gender::{GenderInferer, GenderLabel};
use crate::types::profile::{AttributeValue, ProfileAttributes};
use serde::{Deserialize, Serialize};

/// Current feature schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Feature names of schema v1, in vector order
pub const FEATURE_NAMES: [&str; 14] = [
    // Log-scaled counts (7)
    "statuses_count",
    "followers_count",
    "friends_count",
    "favourites_count",
    "listed_count",
    "description_length",
    "account_age_days",
    // Binary flags (3)
    "has_profile_image",
    "is_private",
    "is_verified",
    // Categorical (2)
    "lang_code",
    "gender",
    // Engineered (2)
    "friends_followers_ratio",
    "statuses_per_day",
];

/// Language codes known at training time; `lang_code` is index + 1, 0 when unknown
const DEFAULT_LANGUAGES: [&str; 16] = [
    "en", "es", "fr", "de", "it", "pt", "nl", "ru", "tr", "ar", "ja", "ko", "zh", "hi", "id",
    "pl",
];

/// Versioned feature layout plus the lookup tables its transforms depend on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub feature_names: Vec<String>,
    pub languages: Vec<String>,
}

impl FeatureSchema {
    /// Schema v1 with the default language table
    pub fn v1() -> Self {
        Self {
            version: SCHEMA_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            languages: DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Schema v1 with a language table exported by the training run
    pub fn v1_with_languages(languages: Vec<String>) -> Self {
        Self {
            languages: languages.into_iter().map(|l| l.to_lowercase()).collect(),
            ..Self::v1()
        }
    }

    pub fn len(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_names.is_empty()
    }

    /// Ordinal language code: full tag first, then primary subtag (`pt-BR` → `pt`)
    pub fn language_code(&self, language: &str) -> f32 {
        let tag = language.trim().to_lowercase().replace('_', "-");
        if tag.is_empty() {
            return 0.0;
        }

        let position = self.languages.iter().position(|l| *l == tag).or_else(|| {
            let primary = tag.split('-').next().unwrap_or_default();
            self.languages.iter().position(|l| l == primary)
        });

        position.map(|i| (i + 1) as f32).unwrap_or(0.0)
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::v1()
    }
}

/// Encoded profile, tagged with the schema version that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub schema_version: u32,
    pub values: Vec<f32>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

/// Profile attributes after coercion and imputation, before scaling
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedProfile {
    pub statuses: f64,
    pub followers: f64,
    pub friends: f64,
    pub favourites: f64,
    pub listed: f64,
    pub description_length: f64,
    pub account_age_days: f64,
    pub has_profile_image: bool,
    pub is_private: bool,
    pub is_verified: bool,
    pub lang_code: f32,
    pub gender: GenderLabel,
}

/// Encoder that transforms profile attributes into model input features.
///
/// Features are emitted in the exact order of [`FEATURE_NAMES`].
#[derive(Debug, Clone)]
pub struct FeatureCodec {
    schema: FeatureSchema,
    gender: GenderInferer,
}

impl FeatureCodec {
    pub fn new(gender: GenderInferer) -> Self {
        Self::with_schema(FeatureSchema::v1(), gender)
    }

    pub fn with_schema(schema: FeatureSchema, gender: GenderInferer) -> Self {
        Self { schema, gender }
    }

    /// Encode a profile.
    ///
    /// Missing counts default to 0, missing flags to false, a missing name to
    /// unknown gender. Values that cannot be coerced raise [`SchemaError`].
    pub fn encode(&self, profile: &ProfileAttributes) -> Result<FeatureVector, SchemaError> {
        let coerced = self.coerce(profile)?;
        Ok(self.vectorize(&coerced))
    }

    /// Validate and impute raw attributes without scaling them.
    ///
    /// The gender inferer runs here, once per profile.
    pub fn coerce(&self, profile: &ProfileAttributes) -> Result<CoercedProfile, SchemaError> {
        Ok(CoercedProfile {
            statuses: count(&profile.statuses_count, "statuses_count")?,
            followers: count(&profile.followers_count, "followers_count")?,
            friends: count(&profile.friends_count, "friends_count")?,
            favourites: count(&profile.favourites_count, "favourites_count")?,
            listed: count(&profile.listed_count, "listed_count")?,
            description_length: count(&profile.description_length, "description_length")?,
            account_age_days: count(&profile.account_age_days, "account_age_days")?,
            has_profile_image: flag(&profile.has_profile_image, "has_profile_image")?,
            is_private: flag(&profile.is_private, "is_private")?,
            is_verified: flag(&profile.is_verified, "is_verified")?,
            lang_code: profile
                .language
                .as_deref()
                .map(|l| self.schema.language_code(l))
                .unwrap_or(0.0),
            gender: self.gender.infer(profile.name.as_deref().unwrap_or_default()),
        })
    }

    /// Apply the schema transforms to a coerced profile
    pub fn vectorize(&self, p: &CoercedProfile) -> FeatureVector {
        let mut values = Vec::with_capacity(FEATURE_NAMES.len());

        // Log-scaled counts
        values.push(log_scale(p.statuses));
        values.push(log_scale(p.followers));
        values.push(log_scale(p.friends));
        values.push(log_scale(p.favourites));
        values.push(log_scale(p.listed));
        values.push(log_scale(p.description_length));
        values.push(log_scale(p.account_age_days));

        // Flags
        values.push(binary(p.has_profile_image));
        values.push(binary(p.is_private));
        values.push(binary(p.is_verified));

        // Categorical
        values.push(p.lang_code);
        values.push(p.gender.ordinal());

        // friends_followers_ratio
        values.push(ratio(p.friends, p.followers));

        // statuses_per_day
        values.push(ratio(p.statuses, p.account_age_days));

        FeatureVector {
            schema_version: self.schema.version,
            values,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.schema.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.schema.feature_names
    }
}

fn count(value: &Option<AttributeValue>, field: &str) -> Result<f64, SchemaError> {
    match value {
        Some(v) => Ok(v.to_count(field)?.unwrap_or(0.0)),
        None => Ok(0.0),
    }
}

fn flag(value: &Option<AttributeValue>, field: &str) -> Result<bool, SchemaError> {
    match value {
        Some(v) => Ok(v.to_flag(field)?.unwrap_or(false)),
        None => Ok(false),
    }
}

fn log_scale(x: f64) -> f32 {
    x.ln_1p() as f32
}

/// `numerator / (denominator + 1)`, saturated so huge counts stay finite in f32
fn ratio(numerator: f64, denominator: f64) -> f32 {
    (numerator / (denominator + 1.0)).min(f32::MAX as f64) as f32
}

fn binary(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}
