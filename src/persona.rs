//! Persona configuration and the ownership-match overlay.
//!
//! A single persona record per install. It is applied to a viewed profile only
//! when the fuzzy name match judges the profile to be the configured user's
//! own; otherwise the customization is explicitly cleared so nothing leaks
//! onto an unrelated person.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::extractor::ProfileRecord;

/// Tone applied to customized responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    #[default]
    Friendly,
    Professional,
    Casual,
    Enthusiastic,
    Thoughtful,
}

/// Canned answers for the fixed topic slots.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct TopicResponses {
    pub work: String,
    pub skills: String,
    pub goals: String,
    pub contact: String,
    pub interests: String,
}

/// One user-authored (trigger, answer) pair.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomResponse {
    pub question: String,
    pub answer: String,
}

/// The user's customization record, persisted as a single value.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct PersonaConfig {
    pub name: String,
    pub headline: String,
    pub bio: String,
    pub response_style: ResponseStyle,
    pub topic_responses: TopicResponses,
    pub custom_responses: Vec<CustomResponse>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Customization carried alongside a matched profile for the responder.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomPersonality {
    pub has_custom_bio: bool,
    pub response_style: ResponseStyle,
    pub topic_responses: TopicResponses,
    pub custom_responses: Vec<CustomResponse>,
}

/// A scraped record with the ownership decision applied.
#[derive(Debug, Clone)]
pub struct MergedPersona {
    pub record: ProfileRecord,
    pub is_own_profile: bool,
    pub custom: Option<CustomPersonality>,
}

/// Fuzzy ownership match between a scraped profile name and the configured
/// name. Positive on exact equality, or when one normalized name contains the
/// other (both longer than 3 chars, length difference at most 10) and the
/// shared whitespace-delimited tokens number at least two and cover the
/// shorter name completely.
pub fn names_match(profile_name: &str, configured_name: &str) -> bool {
    let profile = profile_name.trim().to_lowercase();
    let configured = configured_name.trim().to_lowercase();
    if profile.is_empty() || configured.is_empty() {
        return false;
    }
    if profile == configured {
        return true;
    }

    let close = profile.len() > 3
        && configured.len() > 3
        && (profile.contains(&configured) || configured.contains(&profile))
        && profile.len().abs_diff(configured.len()) <= 10;
    if !close {
        return false;
    }

    let profile_tokens: Vec<&str> = profile.split_whitespace().filter(|t| t.len() > 1).collect();
    let configured_tokens: Vec<&str> =
        configured.split_whitespace().filter(|t| t.len() > 1).collect();
    let shared = profile_tokens
        .iter()
        .filter(|t| configured_tokens.contains(t))
        .count();
    shared >= 2 && shared == profile_tokens.len().min(configured_tokens.len())
}

/// Overlay the persona config onto a scraped record.
///
/// On a positive match the bio (when non-empty) replaces the scraped about
/// text; experience, education and skills always stay scraped. On a negative
/// match the customization sub-record is cleared.
pub fn merge(record: ProfileRecord, config: Option<&PersonaConfig>) -> MergedPersona {
    let Some(config) = config else {
        return MergedPersona { record, is_own_profile: false, custom: None };
    };

    if !names_match(&record.name, &config.name) {
        tracing::debug!(
            profile = %record.name,
            configured = %config.name,
            "profile is not the configured user, customization cleared"
        );
        return MergedPersona { record, is_own_profile: false, custom: None };
    }

    let mut record = record;
    let has_custom_bio = !config.bio.trim().is_empty();
    if has_custom_bio {
        record.about = config.bio.clone();
    }
    tracing::debug!(
        bio = if has_custom_bio { "custom" } else { "scraped" },
        experience = record.experience.len(),
        "merged persona config onto own profile"
    );

    MergedPersona {
        record,
        is_own_profile: true,
        custom: Some(CustomPersonality {
            has_custom_bio,
            response_style: config.response_style,
            topic_responses: config.topic_responses.clone(),
            custom_responses: config.custom_responses.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_named(name: &str) -> ProfileRecord {
        ProfileRecord {
            name: name.to_string(),
            about: "scraped about".to_string(),
            experience: vec!["Data Scientist at Initech".to_string()],
            education: vec!["BS from State University".to_string()],
            skills: vec!["SQL".to_string(), "Python".to_string()],
            ..Default::default()
        }
    }

    fn config_named(name: &str) -> PersonaConfig {
        PersonaConfig { name: name.to_string(), ..Default::default() }
    }

    #[test]
    fn test_identical_names_match() {
        assert!(names_match("Jane Doe", "Jane Doe"));
        assert!(names_match("Jane Doe", "  jane doe "));
    }

    #[test]
    fn test_unrelated_names_do_not_match() {
        assert!(!names_match("Jane Doe", "John Smith"));
        assert!(!names_match("Jane Doe", ""));
        assert!(!names_match("", "Jane Doe"));
    }

    #[test]
    fn test_containment_needs_two_shared_tokens() {
        // "Dr. Jane Doe" contains "Jane Doe" and shares both of its tokens.
        assert!(names_match("Dr. Jane Doe", "Jane Doe"));
        // Single shared token is not enough even with containment.
        assert!(!names_match("Jane", "Jane Doe"));
    }

    #[test]
    fn test_length_gap_rejected() {
        assert!(!names_match("Jane Doe", "Jane Doe of the Northern Data Guild"));
    }

    #[test]
    fn test_bio_overlays_about_only() {
        let mut config = config_named("Jane Doe");
        config.bio = "Hand-written bio.".to_string();
        let merged = merge(record_named("Jane Doe"), Some(&config));

        assert!(merged.is_own_profile);
        assert_eq!(merged.record.about, "Hand-written bio.");
        assert_eq!(merged.record.experience, vec!["Data Scientist at Initech"]);
        assert_eq!(merged.record.education, vec!["BS from State University"]);
        assert_eq!(merged.record.skills, vec!["SQL", "Python"]);
        assert!(merged.custom.as_ref().unwrap().has_custom_bio);
    }

    #[test]
    fn test_empty_bio_keeps_scraped_about() {
        let config = config_named("Jane Doe");
        let merged = merge(record_named("Jane Doe"), Some(&config));
        assert_eq!(merged.record.about, "scraped about");
        assert!(!merged.custom.as_ref().unwrap().has_custom_bio);
    }

    #[test]
    fn test_mismatch_clears_customization() {
        let mut config = config_named("John Smith");
        config.bio = "Should not leak.".to_string();
        config.custom_responses.push(CustomResponse {
            question: "secret".to_string(),
            answer: "leaky".to_string(),
        });
        let merged = merge(record_named("Jane Doe"), Some(&config));

        assert!(!merged.is_own_profile);
        assert!(merged.custom.is_none());
        assert_eq!(merged.record.about, "scraped about");
    }
}
