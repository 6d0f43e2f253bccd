use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::browser::ChromeSurface;
use crate::config::{HarvesterConfig, LoaderConfig};
use crate::delivery::DeliveryClient;
use crate::extract::{extract_profile, extract_profile_links};
use crate::loader::IncrementalLoader;
use crate::models::{FlowOutcome, Profile, ProfileSubmission, ScrapedProfile, UrlBatch};
use crate::page::PageKind;

const SITE_BASE_URL: &str = "https://www.linkedin.com";
const EXPAND_ATTEMPTS: u32 = 3;

/// A URL file is either a plain array or a `/save_urls` body.
#[derive(Deserialize)]
#[serde(untagged)]
enum UrlList {
    Plain(Vec<String>),
    Batch { urls: Vec<String> },
}

/// Profile URLs listed in a collected URL file.
pub fn read_url_list(bytes: &[u8]) -> Result<Vec<String>> {
    let list: UrlList = serde_json::from_slice(bytes)
        .context("expected a JSON array of URLs or an object with a \"urls\" array")?;
    let urls = match list {
        UrlList::Plain(urls) | UrlList::Batch { urls } => urls,
    };
    Ok(urls
        .into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect())
}

/// `<dir>/<stem>.json` becomes `<dir>/<stem>_profiles.json`.
pub fn profiles_output_path(urls_file: &Path) -> PathBuf {
    let stem = urls_file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "profile_urls".to_string());
    urls_file.with_file_name(format!("{stem}_profiles.json"))
}

/// Runs the user-triggered flows: people listing, single profile and a batch
/// of profiles
#[derive(Clone)]
pub struct Harvester {
    config: HarvesterConfig,
    delivery: DeliveryClient,
    cancel: Option<watch::Receiver<bool>>,
}

impl Harvester {
    pub fn new(config: HarvesterConfig) -> Self {
        let delivery = DeliveryClient::new(&config.endpoint);
        Self {
            config,
            delivery,
            cancel: None,
        }
    }

    /// Stop loading early once `cancel` holds `true`; whatever loaded so far
    /// is still extracted and delivered.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn loader(&self, config: &LoaderConfig) -> Result<IncrementalLoader> {
        let loader = IncrementalLoader::new(config.clone())?;
        Ok(match &self.cancel {
            Some(cancel) => loader.with_cancellation(cancel.clone()),
            None => loader,
        })
    }

    /// Load a company people listing completely, collect the profile links
    /// and deliver them under `filename`.
    pub async fn harvest_people(&self, url: &str, filename: &str) -> Result<FlowOutcome> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Ok(FlowOutcome::Failure("Please enter a filename.".to_string()));
        }

        let kind = PageKind::classify(url);
        if kind != PageKind::CompanyPeople {
            warn!("Refusing to scrape {}: {}", url, kind.hint());
            return Ok(FlowOutcome::Failure(format!(
                "Cannot scrape this page ({})",
                kind.hint()
            )));
        }

        let surface = ChromeSurface::launch(&self.config.browser)?
            .with_reveal_text(Some(self.config.people_selectors.reveal_text.clone()));
        surface.navigate(url).await?;

        let outcome = self.loader(&self.config.people_loader)?.run(&surface).await?;
        if !outcome.converged() {
            warn!("Listing did not settle ({:?}), collecting what loaded", outcome.termination);
        }

        let html = surface.html().await?;
        let urls = extract_profile_links(&html, SITE_BASE_URL, &self.config.people_selectors)?;
        let count = urls.len();
        info!("Final profile count: {}", count);

        let batch = UrlBatch {
            urls,
            filename: filename.to_string(),
        };
        let delivered = self.delivery.send_urls(&batch).await;
        Ok(if delivered.is_success() {
            FlowOutcome::Success(format!("{count} profile URLs saved to {filename}.json"))
        } else {
            delivered
        })
    }

    /// Expand and load a single profile page, extract its fields and deliver
    /// them.
    pub async fn harvest_profile(&self, url: &str) -> Result<(Profile, FlowOutcome)> {
        let surface = ChromeSurface::launch(&self.config.browser)?;
        let profile = self.load_profile(&surface, url).await?;

        let submission = ProfileSubmission::from_profile(url, &profile);
        let outcome = self.delivery.send_profile(&submission).await;

        Ok((profile, outcome))
    }

    /// Extract every profile listed in `urls_file` with one browser and write
    /// them to `<stem>_profiles.json` next to it.
    ///
    /// A page that fails is recorded with its error and the batch moves on.
    ///
    /// # Returns
    /// * `Result<(PathBuf, usize)>` - output file and number of profiles without errors
    pub async fn harvest_profiles(&self, urls_file: &Path) -> Result<(PathBuf, usize)> {
        let bytes = tokio::fs::read(urls_file)
            .await
            .with_context(|| format!("cannot read {}", urls_file.display()))?;
        let urls = read_url_list(&bytes)
            .with_context(|| format!("{} is not a URL list", urls_file.display()))?;
        let output = profiles_output_path(urls_file);

        let mut results = Vec::with_capacity(urls.len());
        if urls.is_empty() {
            warn!("No profile URLs in {}", urls_file.display());
        } else {
            let surface = ChromeSurface::launch(&self.config.browser)?;
            let total = urls.len();

            for (index, url) in urls.into_iter().enumerate() {
                if self.is_cancelled() {
                    warn!("Interrupted after {}/{} profiles", index, total);
                    break;
                }
                info!("Scraping profile {}/{}: {}", index + 1, total, url);

                let entry = match self.load_profile(&surface, &url).await {
                    Ok(profile) => ScrapedProfile {
                        url,
                        profile,
                        error: None,
                    },
                    Err(e) => {
                        error!("Error scraping {}: {:#}", url, e);
                        ScrapedProfile {
                            url,
                            profile: Profile::default(),
                            error: Some(format!("{e:#}")),
                        }
                    }
                };
                results.push(entry);
            }
        }

        let scraped = results.iter().filter(|entry| entry.error.is_none()).count();
        tokio::fs::write(&output, serde_json::to_vec_pretty(&results)?)
            .await
            .with_context(|| format!("cannot write {}", output.display()))?;
        info!(
            "Saved {} profiles ({} failed) to {}",
            results.len(),
            results.len() - scraped,
            output.display()
        );

        Ok((output, scraped))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn load_profile(&self, surface: &ChromeSurface, url: &str) -> Result<Profile> {
        let selectors = &self.config.profile_selectors;

        surface.navigate(url).await?;

        surface.expand(&selectors.about_expand, EXPAND_ATTEMPTS).await;

        self.loader(&self.config.profile_loader)?.run(surface).await?;

        for selector in &selectors.experience_expand {
            surface.expand(selector, EXPAND_ATTEMPTS).await;
        }
        surface.expand(&selectors.education_expand, EXPAND_ATTEMPTS).await;
        surface.expand(&selectors.skills_expand, EXPAND_ATTEMPTS).await;

        let html = surface.html().await?;
        let profile = extract_profile(&html, selectors)?;
        info!(
            "Extracted {} ({} positions, {} schools, {} skills)",
            profile.name.as_deref().unwrap_or("unnamed profile"),
            profile.experience.len(),
            profile.education.len(),
            profile.skills.len()
        );

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrowserConfig, PeopleSelectors, ProfileSelectors};
    use tempfile::tempdir;

    fn harvester() -> Harvester {
        Harvester::new(HarvesterConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            browser: BrowserConfig {
                headless: true,
                profile_dir: None,
            },
            people_loader: LoaderConfig::people(),
            profile_loader: LoaderConfig::profile(),
            people_selectors: PeopleSelectors::default(),
            profile_selectors: ProfileSelectors::default(),
        })
    }

    #[tokio::test]
    async fn test_empty_filename_refused_before_browser_work() {
        let outcome = harvester()
            .harvest_people("https://www.linkedin.com/company/acme/people/", "  ")
            .await
            .unwrap();
        assert_eq!(outcome, FlowOutcome::Failure("Please enter a filename.".to_string()));
    }

    #[tokio::test]
    async fn test_non_people_page_refused() {
        let outcome = harvester()
            .harvest_people("https://www.linkedin.com/feed/", "acme")
            .await
            .unwrap();
        assert!(!outcome.is_success());
        assert!(outcome.message().contains("Not on a Company People page"));
    }

    #[test]
    fn test_url_list_accepts_both_shapes() {
        let plain = read_url_list(br#"["https://www.linkedin.com/in/ada", " "]"#).unwrap();
        assert_eq!(plain, vec!["https://www.linkedin.com/in/ada".to_string()]);

        let batch =
            read_url_list(br#"{"urls": [" https://www.linkedin.com/in/bob "], "filename": "x"}"#)
                .unwrap();
        assert_eq!(batch, vec!["https://www.linkedin.com/in/bob".to_string()]);

        assert!(read_url_list(br#"{"links": []}"#).is_err());
    }

    #[test]
    fn test_profiles_output_path() {
        assert_eq!(
            profiles_output_path(Path::new("data/acme.json")),
            PathBuf::from("data/acme_profiles.json")
        );
        assert_eq!(
            profiles_output_path(Path::new("acme people")),
            PathBuf::from("acme people_profiles.json")
        );
    }

    #[tokio::test]
    async fn test_empty_url_file_writes_empty_batch() {
        let temp = tempdir().unwrap();
        let urls_file = temp.path().join("acme.json");
        std::fs::write(&urls_file, "[]").unwrap();

        let (output, scraped) = harvester().harvest_profiles(&urls_file).await.unwrap();

        assert_eq!(output, temp.path().join("acme_profiles.json"));
        assert_eq!(scraped, 0);
        assert_eq!(std::fs::read_to_string(output).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_unreadable_url_file_is_an_error() {
        let temp = tempdir().unwrap();
        let urls_file = temp.path().join("acme.json");
        std::fs::write(&urls_file, "not json").unwrap();

        assert!(harvester().harvest_profiles(&urls_file).await.is_err());
        assert!(!temp.path().join("acme_profiles.json").exists());
    }
}
