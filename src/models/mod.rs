//! Data models for extracted profiles and collection endpoint payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields extracted from a single profile page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: Option<String>,
    pub location: Option<String>,
    pub about: Option<String>,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub skills: Vec<String>,
}

/// One position listed in a profile's experience section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Experience {
    pub title: String,
    pub company: Option<String>,
    pub duration: Option<String>,
}

/// One entry of a profile's education section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Education {
    pub school: String,
    pub degree: Option<String>,
    pub field: Option<String>,
}

/// One entry of a batch profile file; `error` is set when the page failed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapedProfile {
    pub url: String,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Profile links collected from a people listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlBatch {
    pub urls: Vec<String>,
    pub filename: String,
}

/// A profile as submitted to the collection endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSubmission {
    pub profile_url: String,
    pub profile_name: String,
    #[serde(default)]
    pub experiences: Vec<SubmittedExperience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
}

/// Experience entry in the shape the collection files use
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedExperience {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub duration: String,
}

impl ProfileSubmission {
    pub fn from_profile(profile_url: &str, profile: &Profile) -> Self {
        let experiences = profile
            .experience
            .iter()
            .map(|exp| SubmittedExperience {
                company: exp.company.clone().unwrap_or_default(),
                job_title: exp.title.clone(),
                duration: exp.duration.clone().unwrap_or_default(),
            })
            .collect();

        Self {
            profile_url: profile_url.to_string(),
            profile_name: profile.name.clone().unwrap_or_else(|| "N/A".to_string()),
            experiences,
            scraped_at: Some(Utc::now()),
        }
    }
}

/// JSON body returned by the collection endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl ServerReply {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Some("success".to_string()),
            error: None,
            message: message.into(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status: None,
            message: error.clone(),
            error: Some(error),
        }
    }
}

/// Result of a user-triggered flow, reported back to the command surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Success(String),
    Failure(String),
}

impl FlowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success(message) | Self::Failure(message) => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_from_profile() {
        let profile = Profile {
            name: Some("Ada Lovelace".to_string()),
            experience: vec![Experience {
                title: "Analyst".to_string(),
                company: Some("Engines Ltd".to_string()),
                duration: None,
            }],
            ..Profile::default()
        };

        let submission = ProfileSubmission::from_profile("https://www.linkedin.com/in/ada", &profile);
        let json = serde_json::to_value(&submission).unwrap();

        assert_eq!(json["profileName"], "Ada Lovelace");
        assert_eq!(json["profileUrl"], "https://www.linkedin.com/in/ada");
        assert_eq!(json["experiences"][0]["jobTitle"], "Analyst");
        assert_eq!(json["experiences"][0]["company"], "Engines Ltd");
        assert_eq!(json["experiences"][0]["duration"], "");
    }

    #[test]
    fn test_unnamed_profile_submits_placeholder() {
        let submission = ProfileSubmission::from_profile("u", &Profile::default());
        assert_eq!(submission.profile_name, "N/A");
        assert!(submission.experiences.is_empty());
    }
}
