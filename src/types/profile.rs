//! Raw profile attributes as submitted by a form or API call

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single attribute value exactly as it was submitted.
///
/// Forms send everything as text while API clients send native JSON types,
/// so coercion into counts and flags happens later, per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Coerce into a non-negative count.
    ///
    /// Returns `Ok(None)` for blank text, which is treated like an absent field.
    pub fn to_count(&self, field: &str) -> Result<Option<f64>, SchemaError> {
        let value = match self {
            AttributeValue::Number(n) => *n,
            AttributeValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                s.parse::<f64>().map_err(|_| {
                    SchemaError::new(field, format!("expected a number, got {s:?}"))
                })?
            }
            AttributeValue::Bool(b) => {
                return Err(SchemaError::new(
                    field,
                    format!("expected a number, got boolean {b}"),
                ))
            }
        };

        if !value.is_finite() {
            return Err(SchemaError::new(field, "value is not finite"));
        }
        if value < 0.0 {
            return Err(SchemaError::new(field, format!("cannot be negative ({value})")));
        }
        Ok(Some(value))
    }

    /// Coerce into a boolean flag.
    pub fn to_flag(&self, field: &str) -> Result<Option<bool>, SchemaError> {
        match self {
            AttributeValue::Bool(b) => Ok(Some(*b)),
            AttributeValue::Number(n) if *n == 1.0 => Ok(Some(true)),
            AttributeValue::Number(n) if *n == 0.0 => Ok(Some(false)),
            AttributeValue::Number(n) => Err(SchemaError::new(
                field,
                format!("expected 0 or 1, got {n}"),
            )),
            AttributeValue::Text(s) => {
                let s = s.trim().to_lowercase();
                match s.as_str() {
                    "" => Ok(None),
                    "true" | "1" | "yes" | "y" => Ok(Some(true)),
                    "false" | "0" | "no" | "n" => Ok(Some(false)),
                    _ => Err(SchemaError::new(
                        field,
                        format!("invalid boolean value {s:?}"),
                    )),
                }
            }
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Number(f64::from(value))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Number(n) => write!(f, "{n}"),
            AttributeValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Raw attributes describing one social-network account.
///
/// Every field is optional; the feature codec imputes documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileAttributes {
    /// Account handle, only consulted by screening rules
    #[serde(default, alias = "username")]
    pub user_id: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Number of posts/statuses
    #[serde(default, alias = "post_count")]
    pub statuses_count: Option<AttributeValue>,

    #[serde(default)]
    pub followers_count: Option<AttributeValue>,

    /// Number of accounts this profile follows
    #[serde(default, alias = "following_count")]
    pub friends_count: Option<AttributeValue>,

    #[serde(default)]
    pub favourites_count: Option<AttributeValue>,

    #[serde(default)]
    pub listed_count: Option<AttributeValue>,

    /// Length of the profile bio in characters
    #[serde(default)]
    pub description_length: Option<AttributeValue>,

    #[serde(default, alias = "has_profile_pic")]
    pub has_profile_image: Option<AttributeValue>,

    #[serde(default)]
    pub is_private: Option<AttributeValue>,

    #[serde(default)]
    pub is_verified: Option<AttributeValue>,

    /// Language/locale code, e.g. `en` or `pt-BR`
    #[serde(default, alias = "lang")]
    pub language: Option<String>,

    /// Days since the account was created
    #[serde(default)]
    pub account_age_days: Option<AttributeValue>,
}

impl ProfileAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_statuses(mut self, value: impl Into<AttributeValue>) -> Self {
        self.statuses_count = Some(value.into());
        self
    }

    pub fn with_followers(mut self, value: impl Into<AttributeValue>) -> Self {
        self.followers_count = Some(value.into());
        self
    }

    pub fn with_friends(mut self, value: impl Into<AttributeValue>) -> Self {
        self.friends_count = Some(value.into());
        self
    }

    pub fn with_favourites(mut self, value: impl Into<AttributeValue>) -> Self {
        self.favourites_count = Some(value.into());
        self
    }

    pub fn with_listed(mut self, value: impl Into<AttributeValue>) -> Self {
        self.listed_count = Some(value.into());
        self
    }

    pub fn with_description_length(mut self, value: impl Into<AttributeValue>) -> Self {
        self.description_length = Some(value.into());
        self
    }

    pub fn with_profile_image(mut self, value: impl Into<AttributeValue>) -> Self {
        self.has_profile_image = Some(value.into());
        self
    }

    pub fn with_private(mut self, value: impl Into<AttributeValue>) -> Self {
        self.is_private = Some(value.into());
        self
    }

    pub fn with_verified(mut self, value: impl Into<AttributeValue>) -> Self {
        self.is_verified = Some(value.into());
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn with_account_age_days(mut self, value: impl Into<AttributeValue>) -> Self {
        self.account_age_days = Some(value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_payload_deserializes() {
        let json = r#"{
            "username": "jane_doe",
            "name": "Jane Doe",
            "post_count": "42",
            "followers_count": 120,
            "following_count": "80",
            "has_profile_pic": "true",
            "is_private": false,
            "lang": "en"
        }"#;

        let profile: ProfileAttributes = serde_json::from_str(json).unwrap();

        assert_eq!(profile.user_id.as_deref(), Some("jane_doe"));
        assert_eq!(profile.statuses_count, Some(AttributeValue::Text("42".into())));
        assert_eq!(profile.followers_count, Some(AttributeValue::Number(120.0)));
        assert_eq!(profile.has_profile_image, Some(AttributeValue::Text("true".into())));
        assert_eq!(profile.is_private, Some(AttributeValue::Bool(false)));
        assert_eq!(profile.language.as_deref(), Some("en"));
        assert!(profile.listed_count.is_none());
    }

    #[test]
    fn test_count_coercion() {
        assert_eq!(AttributeValue::from("17").to_count("f").unwrap(), Some(17.0));
        assert_eq!(AttributeValue::from(" 3.5 ").to_count("f").unwrap(), Some(3.5));
        assert_eq!(AttributeValue::from("  ").to_count("f").unwrap(), None);
        assert_eq!(AttributeValue::from(9u64).to_count("f").unwrap(), Some(9.0));

        let err = AttributeValue::from("many").to_count("followers_count").unwrap_err();
        assert_eq!(err.field, "followers_count");

        assert!(AttributeValue::from(-1.0).to_count("f").is_err());
        assert!(AttributeValue::from(f64::NAN).to_count("f").is_err());
        assert!(AttributeValue::from(true).to_count("f").is_err());
    }

    #[test]
    fn test_flag_coercion() {
        assert_eq!(AttributeValue::from("Yes").to_flag("f").unwrap(), Some(true));
        assert_eq!(AttributeValue::from("n").to_flag("f").unwrap(), Some(false));
        assert_eq!(AttributeValue::from(1.0).to_flag("f").unwrap(), Some(true));
        assert_eq!(AttributeValue::from(false).to_flag("f").unwrap(), Some(false));
        assert_eq!(AttributeValue::from("").to_flag("f").unwrap(), None);

        assert!(AttributeValue::from("maybe").to_flag("is_verified").is_err());
        assert!(AttributeValue::from(2.0).to_flag("is_verified").is_err());
    }
}
