//! Deterministic pre-model screening rules.
//!
//! Some profiles are decided without consulting the classifiers: operator
//! whitelisted accounts, verified high-reach accounts, and unverified
//! accounts with follower patterns typical of purchased audiences.
//!
//! [`explain`] lists the human-readable observations behind a verdict; they
//! are attached to every result and never change its label.

use crate::feature_codec::CoercedProfile;
use crate::types::prediction::{DecisionSource, Label, PredictionResult};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// Fake probability reported for whitelisted accounts
pub const WHITELIST_CONFIDENCE: f64 = 0.001;
/// Fake probability reported for verified high-reach accounts
pub const INFLUENCER_CONFIDENCE: f64 = 0.01;
/// Fake probability reported when a suspicious pattern matches
pub const SUSPICIOUS_CONFIDENCE: f64 = 0.95;

const INFLUENCER_MIN_FOLLOWERS: f64 = 10_000.0;
const MIN_FRIENDS_FOLLOWERS_RATIO: f64 = 0.01;
const LOW_ACTIVITY_MIN_FOLLOWERS: f64 = 1_000.0;
const LOW_ACTIVITY_MAX_STATUSES: f64 = 10.0;
const PRIVATE_MAX_FOLLOWERS: f64 = 5_000.0;

/// A screening rule that matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreeningRule {
    Whitelisted,
    Influencer,
    LopsidedFollowRatio,
    LowActivityHighReach,
    PrivateHighReach,
}

impl ScreeningRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreeningRule::Whitelisted => "whitelisted",
            ScreeningRule::Influencer => "influencer",
            ScreeningRule::LopsidedFollowRatio => "lopsided_follow_ratio",
            ScreeningRule::LowActivityHighReach => "low_activity_high_reach",
            ScreeningRule::PrivateHighReach => "private_high_reach",
        }
    }

    pub fn label(&self) -> Label {
        match self {
            ScreeningRule::Whitelisted | ScreeningRule::Influencer => Label::Genuine,
            _ => Label::Fake,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            ScreeningRule::Whitelisted => WHITELIST_CONFIDENCE,
            ScreeningRule::Influencer => INFLUENCER_CONFIDENCE,
            _ => SUSPICIOUS_CONFIDENCE,
        }
    }

    /// Why the rule matched, with the numbers that triggered it
    pub fn describe(&self, profile: &CoercedProfile) -> String {
        match self {
            ScreeningRule::Whitelisted => "Profile manually verified as authentic".to_string(),
            ScreeningRule::Influencer => {
                format!("Verified account with {:.0} followers", profile.followers)
            }
            ScreeningRule::LopsidedFollowRatio => format!(
                "Follows {:.0} accounts but has {:.0} followers",
                profile.friends, profile.followers
            ),
            ScreeningRule::LowActivityHighReach => format!(
                "{:.0} followers with only {:.0} posts",
                profile.followers, profile.statuses
            ),
            ScreeningRule::PrivateHighReach => {
                format!("Private account with {:.0} followers", profile.followers)
            }
        }
    }
}

/// Screening rules with an operator whitelist
#[derive(Debug, Clone, Default)]
pub struct Screening {
    /// Lowercased account handles
    whitelist: HashSet<String>,
}

impl Screening {
    pub fn new<I, S>(whitelist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            whitelist: whitelist
                .into_iter()
                .map(|s| normalize_handle(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// First matching rule, in priority order
    pub fn evaluate(&self, user_id: Option<&str>, profile: &CoercedProfile) -> Option<ScreeningRule> {
        if let Some(user_id) = user_id {
            if self.whitelist.contains(&normalize_handle(user_id)) {
                return Some(ScreeningRule::Whitelisted);
            }
        }

        if profile.is_verified {
            if profile.followers > INFLUENCER_MIN_FOLLOWERS {
                return Some(ScreeningRule::Influencer);
            }
            return None;
        }

        if profile.followers > 0.0
            && profile.friends / profile.followers < MIN_FRIENDS_FOLLOWERS_RATIO
        {
            return Some(ScreeningRule::LopsidedFollowRatio);
        }
        if profile.followers > LOW_ACTIVITY_MIN_FOLLOWERS
            && profile.statuses < LOW_ACTIVITY_MAX_STATUSES
        {
            return Some(ScreeningRule::LowActivityHighReach);
        }
        if profile.is_private && profile.followers > PRIVATE_MAX_FOLLOWERS {
            return Some(ScreeningRule::PrivateHighReach);
        }

        None
    }

    /// Build a result when a rule matches
    pub fn screen(&self, user_id: Option<&str>, profile: &CoercedProfile) -> Option<PredictionResult> {
        let rule = self.evaluate(user_id, profile)?;

        info!(
            user_id = user_id.unwrap_or("-"),
            rule = rule.as_str(),
            label = %rule.label(),
            "Profile decided by screening rule"
        );

        let mut reasons = vec![rule.describe(profile)];
        if rule != ScreeningRule::Whitelisted {
            reasons.extend(explain(profile));
        }

        Some(PredictionResult {
            label: rule.label(),
            confidence: rule.confidence(),
            per_model_scores: BTreeMap::new(),
            excluded: Vec::new(),
            decided_by: DecisionSource::Screening(rule.as_str().to_string()),
            reasons,
        })
    }
}

/// Notable observations about a profile, most telling first.
///
/// An account age of 0 means the age is unknown and yields no age remark.
pub fn explain(p: &CoercedProfile) -> Vec<String> {
    let mut reasons = Vec::new();
    let known_age = p.account_age_days > 0.0;
    let follow_ratio = if p.followers > 0.0 {
        p.friends / p.followers
    } else {
        0.0
    };

    if p.followers > 0.0 {
        if follow_ratio > 20.0 {
            reasons.push(format!("Extremely high following/followers ratio ({follow_ratio:.1})"));
        } else if follow_ratio > 10.0 {
            reasons.push(format!("Very high following/followers ratio ({follow_ratio:.1})"));
        } else if follow_ratio > 5.0 {
            reasons.push(format!("High following/followers ratio ({follow_ratio:.1})"));
        }
    }

    if known_age {
        let days = p.account_age_days;
        let years = (days / 365.0).floor();
        if days < 7.0 {
            reasons.push(format!("Very new account ({days:.0} days old)"));
        } else if days < 30.0 {
            reasons.push(format!("New account ({days:.0} days old)"));
        } else if days < 90.0 {
            reasons.push(format!("Recent account ({days:.0} days old)"));
        } else if days > 730.0 {
            reasons.push(format!("Well-established account ({years:.0} years old)"));
        } else if days > 365.0 {
            reasons.push(format!("Established account ({years:.0} years old)"));
        }
    }

    if p.statuses == 0.0 {
        reasons.push("No posts at all".to_string());
    } else if p.statuses < 3.0 {
        reasons.push(format!("Minimal posts ({:.0})", p.statuses));
    } else if p.statuses < 10.0 {
        reasons.push(format!("Very few posts ({:.0})", p.statuses));
    } else if p.statuses > 5_000.0 {
        reasons.push(format!("Suspiciously high post count ({:.0})", p.statuses));
    }

    if p.is_verified {
        reasons.push("Verified account".to_string());
    }
    if !p.has_profile_image {
        reasons.push("No profile picture".to_string());
    }

    if p.followers == 0.0 {
        reasons.push("No followers".to_string());
    } else if p.followers < 10.0 {
        reasons.push(format!("Very few followers ({:.0})", p.followers));
    }

    if p.description_length == 0.0 {
        reasons.push("No bio".to_string());
    } else if p.description_length < 10.0 {
        reasons.push("Minimal bio".to_string());
    }

    if known_age && p.account_age_days < 30.0 && p.statuses < 5.0 {
        reasons.push("New account with minimal activity".to_string());
    }
    if known_age && follow_ratio > 10.0 && p.account_age_days < 90.0 && p.followers < 100.0 {
        reasons.push("Bot-like activity pattern".to_string());
    }

    reasons
}

fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}
