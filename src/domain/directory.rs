//! Therapist records, directory filtering and therapist onboarding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Therapist {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub title: String,
    pub specialties: Vec<String>,
    pub languages: Vec<String>,
    pub location: String,
    pub bio: Option<String>,
    pub education: Option<String>,
    pub price: Option<String>,
    pub online: bool,
    pub in_person: bool,
    pub rating: f64,
    pub reviews: i32,
    pub image_url: Option<String>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFilter {
    #[default]
    All,
    Online,
    #[serde(alias = "inPerson")]
    InPerson,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryFilter {
    pub search: Option<String>,
    pub specialties: Vec<String>,
    pub languages: Vec<String>,
    pub session: SessionFilter,
}

impl DirectoryFilter {
    /// Number of active filters, not counting the search term.
    pub fn active_count(&self) -> usize {
        self.specialties.len()
            + self.languages.len()
            + usize::from(self.session != SessionFilter::All)
    }

    pub fn matches(&self, therapist: &Therapist) -> bool {
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let hit = therapist.name.to_lowercase().contains(&term)
                || therapist.title.to_lowercase().contains(&term)
                || therapist.location.to_lowercase().contains(&term)
                || therapist
                    .specialties
                    .iter()
                    .any(|s| s.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }

        if !self.specialties.is_empty()
            && !therapist
                .specialties
                .iter()
                .any(|s| self.specialties.contains(s))
        {
            return false;
        }

        if !self.languages.is_empty()
            && !therapist.languages.iter().any(|l| self.languages.contains(l))
        {
            return false;
        }

        match self.session {
            SessionFilter::All => true,
            SessionFilter::Online => therapist.online,
            SessionFilter::InPerson => therapist.in_person,
        }
    }
}

/// Keeps approved therapists matching `filter`, in their original order.
pub fn filter_directory(therapists: &[Therapist], filter: &DirectoryFilter) -> Vec<Therapist> {
    therapists
        .iter()
        .filter(|t| t.approved && filter.matches(t))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    pub specialties: Vec<String>,
    pub languages: Vec<String>,
}

/// Distinct specialties and languages in first-seen order.
pub fn facets(therapists: &[Therapist]) -> Facets {
    let mut facets = Facets::default();
    for therapist in therapists {
        for specialty in &therapist.specialties {
            if !facets.specialties.contains(specialty) {
                facets.specialties.push(specialty.clone());
            }
        }
        for language in &therapist.languages {
            if !facets.languages.contains(language) {
                facets.languages.push(language.clone());
            }
        }
    }
    facets
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TherapistApplication {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub price: String,
    #[serde(default = "default_true")]
    pub online: bool,
    #[serde(default = "default_true")]
    pub in_person: bool,
    #[serde(default)]
    pub terms_accepted: bool,
    pub image_url: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTherapist {
    pub user_id: Uuid,
    pub name: String,
    pub title: String,
    pub specialties: Vec<String>,
    pub languages: Vec<String>,
    pub location: String,
    pub bio: String,
    pub education: String,
    pub price: String,
    pub online: bool,
    pub in_person: bool,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplicationError {
    #[error("Name, title and location are required")]
    MissingBasics,
    #[error("Select at least one specialty and one language")]
    MissingExpertise,
    #[error("Bio, education and price are required")]
    MissingBackground,
    #[error("At least one session type must be offered")]
    NoSessionType,
    #[error("You must accept the terms to continue")]
    TermsNotAccepted,
}

fn dedup_trimmed(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if !out.iter().any(|existing| existing == value) {
            out.push(value.to_string());
        }
    }
    out
}

/// Validates the four onboarding steps in order.
pub fn validate_application(
    user_id: Uuid,
    application: &TherapistApplication,
) -> Result<NewTherapist, ApplicationError> {
    let name = application.name.trim();
    let title = application.title.trim();
    let location = application.location.trim();
    if name.is_empty() || title.is_empty() || location.is_empty() {
        return Err(ApplicationError::MissingBasics);
    }

    let specialties = dedup_trimmed(&application.specialties);
    let languages = dedup_trimmed(&application.languages);
    if specialties.is_empty() || languages.is_empty() {
        return Err(ApplicationError::MissingExpertise);
    }

    let bio = application.bio.trim();
    let education = application.education.trim();
    let price = application.price.trim();
    if bio.is_empty() || education.is_empty() || price.is_empty() {
        return Err(ApplicationError::MissingBackground);
    }

    if !application.online && !application.in_person {
        return Err(ApplicationError::NoSessionType);
    }

    if !application.terms_accepted {
        return Err(ApplicationError::TermsNotAccepted);
    }

    Ok(NewTherapist {
        user_id,
        name: name.to_string(),
        title: title.to_string(),
        specialties,
        languages,
        location: location.to_string(),
        bio: bio.to_string(),
        education: education.to_string(),
        price: price.to_string(),
        online: application.online,
        in_person: application.in_person,
        image_url: application.image_url.clone(),
    })
}
