//! Onboarding profile of an end user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const AGE_RANGES: &[&str] = &["under18", "18-24", "25-34", "35-44", "45+"];
pub const THERAPIST_GENDERS: &[&str] = &["male", "female", "no-preference"];
pub const LANGUAGES: &[&str] = &["Swahili", "English", "Both"];
pub const DEFAULT_LANGUAGE: &str = "Swahili";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub nickname: String,
    pub age_range: String,
    pub primary_concerns: Vec<String>,
    pub preferred_therapist_gender: Option<String>,
    pub preferred_language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingForm {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub age_range: String,
    #[serde(default)]
    pub primary_concerns: Vec<String>,
    pub preferred_therapist_gender: Option<String>,
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub terms_accepted: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub age_range: Option<String>,
    pub primary_concerns: Option<Vec<String>>,
    pub preferred_therapist_gender: Option<String>,
    pub preferred_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub id: Uuid,
    pub nickname: String,
    pub age_range: String,
    pub primary_concerns: Vec<String>,
    pub preferred_therapist_gender: Option<String>,
    pub preferred_language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("Nickname is required")]
    MissingNickname,
    #[error("Age range must be one of under18, 18-24, 25-34, 35-44, 45+")]
    InvalidAgeRange,
    #[error("Preferred therapist gender must be male, female or no-preference")]
    InvalidGender,
    #[error("Preferred language must be Swahili, English or Both")]
    InvalidLanguage,
    #[error("You must accept the terms to continue")]
    TermsNotAccepted,
}

fn normalize_concerns(concerns: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for concern in concerns.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if !out.iter().any(|c| c == concern) {
            out.push(concern.to_string());
        }
    }
    out
}

fn check_age_range(value: &str) -> Result<(), ProfileError> {
    if AGE_RANGES.contains(&value) {
        Ok(())
    } else {
        Err(ProfileError::InvalidAgeRange)
    }
}

fn check_gender(value: Option<&str>) -> Result<Option<String>, ProfileError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) if THERAPIST_GENDERS.contains(&v) => Ok(Some(v.to_string())),
        Some(_) => Err(ProfileError::InvalidGender),
    }
}

fn check_language(value: &str) -> Result<(), ProfileError> {
    if LANGUAGES.contains(&value) {
        Ok(())
    } else {
        Err(ProfileError::InvalidLanguage)
    }
}

pub fn validate_onboarding(user_id: Uuid, form: &OnboardingForm) -> Result<NewProfile, ProfileError> {
    let nickname = form.nickname.trim();
    if nickname.is_empty() {
        return Err(ProfileError::MissingNickname);
    }
    check_age_range(form.age_range.trim())?;
    let gender = check_gender(form.preferred_therapist_gender.as_deref())?;
    let language = form
        .preferred_language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE);
    check_language(language)?;
    if !form.terms_accepted {
        return Err(ProfileError::TermsNotAccepted);
    }

    Ok(NewProfile {
        id: user_id,
        nickname: nickname.to_string(),
        age_range: form.age_range.trim().to_string(),
        primary_concerns: normalize_concerns(&form.primary_concerns),
        preferred_therapist_gender: gender,
        preferred_language: language.to_string(),
    })
}

impl Profile {
    /// Applies a partial update, validating only the supplied fields.
    pub fn apply(&self, update: &ProfileUpdate) -> Result<Profile, ProfileError> {
        let mut next = self.clone();
        if let Some(nickname) = &update.nickname {
            let nickname = nickname.trim();
            if nickname.is_empty() {
                return Err(ProfileError::MissingNickname);
            }
            next.nickname = nickname.to_string();
        }
        if let Some(age_range) = &update.age_range {
            check_age_range(age_range.trim())?;
            next.age_range = age_range.trim().to_string();
        }
        if let Some(concerns) = &update.primary_concerns {
            next.primary_concerns = normalize_concerns(concerns);
        }
        if update.preferred_therapist_gender.is_some() {
            next.preferred_therapist_gender =
                check_gender(update.preferred_therapist_gender.as_deref())?;
        }
        if let Some(language) = &update.preferred_language {
            check_language(language.trim())?;
            next.preferred_language = language.trim().to_string();
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> OnboardingForm {
        OnboardingForm {
            nickname: "  Kivuli ".into(),
            age_range: "18-24".into(),
            primary_concerns: vec!["Anxiety".into(), "Sleep".into(), "Anxiety".into()],
            preferred_therapist_gender: Some("no-preference".into()),
            preferred_language: None,
            terms_accepted: true,
        }
    }

    #[test]
    fn test_valid_onboarding_normalizes_fields() {
        let user = Uuid::new_v4();
        let profile = validate_onboarding(user, &form()).unwrap();
        assert_eq!(profile.id, user);
        assert_eq!(profile.nickname, "Kivuli");
        assert_eq!(profile.primary_concerns, vec!["Anxiety", "Sleep"]);
        assert_eq!(profile.preferred_language, DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_required_fields() {
        let mut f = form();
        f.nickname = " ".into();
        assert_eq!(
            validate_onboarding(Uuid::nil(), &f),
            Err(ProfileError::MissingNickname)
        );

        let mut f = form();
        f.age_range = "".into();
        assert_eq!(
            validate_onboarding(Uuid::nil(), &f),
            Err(ProfileError::InvalidAgeRange)
        );

        let mut f = form();
        f.terms_accepted = false;
        assert_eq!(
            validate_onboarding(Uuid::nil(), &f),
            Err(ProfileError::TermsNotAccepted)
        );
    }

    #[test]
    fn test_partial_update_only_touches_supplied_fields() {
        let now = Utc::now();
        let original = Profile {
            id: Uuid::nil(),
            nickname: "Kivuli".into(),
            age_range: "18-24".into(),
            primary_concerns: vec![],
            preferred_therapist_gender: None,
            preferred_language: "Swahili".into(),
            created_at: now,
            updated_at: now,
        };
        let updated = original
            .apply(&ProfileUpdate {
                preferred_language: Some("English".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.preferred_language, "English");
        assert_eq!(updated.nickname, "Kivuli");

        assert_eq!(
            original.apply(&ProfileUpdate {
                preferred_language: Some("French".into()),
                ..Default::default()
            }),
            Err(ProfileError::InvalidLanguage)
        );
    }
}
