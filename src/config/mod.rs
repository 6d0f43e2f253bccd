//! Configuration for the loader, the browser and the collection endpoint.
//!
//! Every knob has a default matching the site as it is scraped today; the
//! environment (optionally populated from a `.env` file) overrides them.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::warn;

/// Default collection endpoint, the local server started by `serve`.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000";

/// Default stem of the file profile links are saved to.
pub const DEFAULT_URLS_FILENAME: &str = "profile_urls";

/// Default file individual profiles are collected in.
pub const DEFAULT_PROFILE_FILE: &str = "individual_profiles_data.json";

/// Budget and timing of one incremental loader invocation
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Consecutive no-growth cycles tolerated before giving up
    pub retry_budget: u32,
    /// Settle time after each grow action, before measuring
    pub post_grow_delay: Duration,
    /// Settle time right after a reveal control was activated
    pub post_reveal_delay: Duration,
    /// Extra content-load time after a reveal control was activated
    pub reveal_load_delay: Duration,
    /// Optional hard cap on the number of cycles
    pub max_cycles: Option<u32>,
}

impl LoaderConfig {
    /// Timing used on company people listings, which carry a
    /// "Show more results" button.
    pub fn people() -> Self {
        Self {
            retry_budget: 10,
            post_grow_delay: Duration::from_millis(2000),
            post_reveal_delay: Duration::from_millis(1000),
            reveal_load_delay: Duration::from_millis(3000),
            max_cycles: None,
        }
    }

    /// Timing used on a single profile page, which only needs scrolling.
    pub fn profile() -> Self {
        Self {
            retry_budget: 5,
            post_grow_delay: Duration::from_millis(1500),
            post_reveal_delay: Duration::ZERO,
            reveal_load_delay: Duration::ZERO,
            max_cycles: None,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<u32>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_budget == 0 {
            bail!("retry budget must be positive");
        }
        if self.max_cycles == Some(0) {
            bail!("cycle cap must be positive when set");
        }
        Ok(())
    }
}

/// CSS selectors for the company people listing
#[derive(Debug, Clone)]
pub struct PeopleSelectors {
    /// Anchors pointing at individual profiles
    pub profile_link: String,
    /// Lowercased text a "load more" button contains
    pub reveal_text: String,
}

impl Default for PeopleSelectors {
    fn default() -> Self {
        Self {
            profile_link: "a[href*='/in/']".to_string(),
            reveal_text: "show more results".to_string(),
        }
    }
}

/// CSS selectors for the parts of a single profile page
#[derive(Debug, Clone)]
pub struct ProfileSelectors {
    pub name: String,
    pub name_fallback: String,
    pub location: String,
    pub location_fallback: String,
    pub about: String,
    pub about_fallback: String,
    /// Button expanding the about section
    pub about_expand: String,
    pub experience_section: String,
    /// Buttons expanding the experience section
    pub experience_expand: Vec<String>,
    pub education_section: String,
    pub education_expand: String,
    /// One entry inside the experience or education section
    pub list_item: String,
    /// Bold heading of an entry (job title or school)
    pub entry_title: String,
    /// First secondary line of an entry (company or degree)
    pub entry_subtitle: String,
    /// Second secondary line of an entry (duration or field of study)
    pub entry_detail: String,
    pub skills_expand: String,
    pub skill: String,
}

impl Default for ProfileSelectors {
    fn default() -> Self {
        Self {
            name: "h1.top-card-layout__title".to_string(),
            name_fallback: "h1[data-test-id='profile-content__title']".to_string(),
            location: "div.top-card-layout__entity-info-container span.top-card-layout__locality"
                .to_string(),
            location_fallback:
                "div[data-test-id='profile-content__primary-info'] span.top-card__location"
                    .to_string(),
            about:
                "div.pv-about-section div[data-test-id='about-section-content'] span.visually-hidden"
                    .to_string(),
            about_fallback: "section.summary-card__content div.core-section-container__content"
                .to_string(),
            about_expand: "button[aria-label^='Expand About']".to_string(),
            experience_section: "section.experience-section".to_string(),
            experience_expand: vec![
                "button[aria-label^='Show all positions']".to_string(),
                "button[aria-label^='Show all companies']".to_string(),
            ],
            education_section: "section.education-section".to_string(),
            education_expand: "button[aria-label^='Show all education']".to_string(),
            list_item: ".pvs-list__item".to_string(),
            entry_title: "div.pvs-entity__content-wrapper div.t-bold".to_string(),
            entry_subtitle: "div.pvs-entity__content-wrapper span.t-normal".to_string(),
            entry_detail: "div.pvs-entity__content-wrapper span.t-normal:nth-of-type(2)"
                .to_string(),
            skills_expand: "button[aria-label^='Show all skills']".to_string(),
            skill: ".pv-skill-category-list__item span.t-bold".to_string(),
        }
    }
}

/// Settings for launching the browser
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    /// Chrome user-data directory holding a logged-in session
    pub profile_dir: Option<PathBuf>,
}

/// Top-level configuration assembled from the environment
#[derive(Debug, Clone)]
pub struct HarvesterConfig {
    /// Base URL of the collection endpoint
    pub endpoint: String,
    pub browser: BrowserConfig,
    pub people_loader: LoaderConfig,
    pub profile_loader: LoaderConfig,
    pub people_selectors: PeopleSelectors,
    pub profile_selectors: ProfileSelectors,
}

impl HarvesterConfig {
    /// Build the configuration from environment variables.
    ///
    /// ## Environment Variables
    ///
    /// - `HARVESTER_ENDPOINT`: collection endpoint base URL (default `http://localhost:5000`)
    /// - `HARVESTER_HEADLESS`: `false`/`0` shows the browser window (default headless)
    /// - `HARVESTER_CHROME_PROFILE`: Chrome user-data directory with a logged-in session
    /// - `HARVESTER_REVEAL_TEXT`: text of the "load more" button on listings
    /// - `HARVESTER_MAX_CYCLES`: hard cap on loader cycles (default none)
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("HARVESTER_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();

        let headless = std::env::var("HARVESTER_HEADLESS")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        let profile_dir = std::env::var_os("HARVESTER_CHROME_PROFILE").map(PathBuf::from);
        if profile_dir.is_none() {
            warn!("HARVESTER_CHROME_PROFILE not set - pages will load without a logged-in session");
        }

        let max_cycles = match std::env::var("HARVESTER_MAX_CYCLES") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u32>()
                    .map_err(|e| anyhow::anyhow!("Invalid HARVESTER_MAX_CYCLES {raw:?}: {e}"))?,
            ),
            Err(_) => None,
        };

        let mut people_selectors = PeopleSelectors::default();
        if let Ok(text) = std::env::var("HARVESTER_REVEAL_TEXT") {
            people_selectors.reveal_text = text.trim().to_lowercase();
        }

        let config = Self {
            endpoint,
            browser: BrowserConfig {
                headless,
                profile_dir,
            },
            people_loader: LoaderConfig::people().with_max_cycles(max_cycles),
            profile_loader: LoaderConfig::profile().with_max_cycles(max_cycles),
            people_selectors,
            profile_selectors: ProfileSelectors::default(),
        };

        config.people_loader.validate()?;
        config.profile_loader.validate()?;

        Ok(config)
    }
}

/// Settings for the local collection server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory all collected files are written to
    pub data_dir: PathBuf,
    /// File name (inside `data_dir`) that collects individual profiles
    pub profile_file: String,
}

impl ServerConfig {
    /// ## Environment Variables
    ///
    /// - `HARVESTER_DATA_DIR`: output directory (default current directory)
    /// - `HARVESTER_PROFILE_FILE`: profile collection file (default `individual_profiles_data.json`)
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os("HARVESTER_DATA_DIR")
            .map_or_else(|| PathBuf::from("."), PathBuf::from);
        let profile_file = std::env::var("HARVESTER_PROFILE_FILE")
            .unwrap_or_else(|_| DEFAULT_PROFILE_FILE.to_string());

        Self {
            data_dir,
            profile_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_people_timing_matches_listing_behaviour() {
        let config = LoaderConfig::people();
        assert_eq!(config.retry_budget, 10);
        assert_eq!(config.post_grow_delay, Duration::from_secs(2));
        assert_eq!(config.post_reveal_delay, Duration::from_secs(1));
        assert_eq!(config.reveal_load_delay, Duration::from_secs(3));
        assert!(config.max_cycles.is_none());
    }

    #[test]
    fn test_zero_budget_is_rejected() {
        let mut config = LoaderConfig::profile();
        config.retry_budget = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cycle_cap_is_rejected() {
        let config = LoaderConfig::profile().with_max_cycles(Some(0));
        assert!(config.validate().is_err());
        assert!(LoaderConfig::profile().with_max_cycles(Some(1)).validate().is_ok());
    }
}
