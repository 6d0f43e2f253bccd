//! Extraction of profile links and profile fields from loaded page HTML.
//!
//! Everything here works on an HTML snapshot taken after the loader has
//! converged, so it runs without a browser and is tested against fixtures.

use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::config::{PeopleSelectors, ProfileSelectors};
use crate::models::{Education, Experience, Profile};

static EMPLOYMENT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\b(Full-time|Part-time|Contract|Self-employed|Freelance|Internship)\b.*$")
        .unwrap_or_else(|e| panic!("invalid employment type pattern: {e}"))
});

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| anyhow::anyhow!("Failed to parse selector {selector:?}: {e:?}"))
}

fn clean_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().and_then(clean_text)
}

/// Text of the first match of `primary`, else of `fallback`.
fn text_with_fallback(document: &Html, primary: &str, fallback: &str) -> Result<Option<String>> {
    let primary = parse_selector(primary)?;
    if let Some(text) = first_text(document.root_element(), &primary) {
        return Ok(Some(text));
    }
    let fallback = parse_selector(fallback)?;
    Ok(first_text(document.root_element(), &fallback))
}

/// Turn a link target into an absolute profile URL without query or fragment.
fn normalize_profile_url(href: &str, base_url: &str) -> String {
    let url = if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with("//") {
        format!("https:{href}")
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href.trim_start_matches('/'))
    };

    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_string()
}

/// Collect the distinct profile links of a loaded people listing, in page order.
pub fn extract_profile_links(
    html: &str,
    base_url: &str,
    selectors: &PeopleSelectors,
) -> Result<Vec<String>> {
    let link_selector = parse_selector(&selectors.profile_link)?;
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for link in document.select(&link_selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let url = normalize_profile_url(href, base_url);
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }

    info!("Found {} unique profile links", urls.len());
    Ok(urls)
}

/// Strip the employment type (and whatever follows it) from a company line.
pub fn clean_company(raw: &str) -> Option<String> {
    let company = EMPLOYMENT_TYPE.replace(raw, "");
    let company = company.trim();
    (!company.is_empty()).then(|| company.to_string())
}

/// Pull the structured fields out of a loaded profile page.
pub fn extract_profile(html: &str, selectors: &ProfileSelectors) -> Result<Profile> {
    let document = Html::parse_document(html);

    let list_item = parse_selector(&selectors.list_item)?;
    let entry_title = parse_selector(&selectors.entry_title)?;
    let entry_subtitle = parse_selector(&selectors.entry_subtitle)?;
    let entry_detail = parse_selector(&selectors.entry_detail)?;

    let name = text_with_fallback(&document, &selectors.name, &selectors.name_fallback)?;
    let location = text_with_fallback(&document, &selectors.location, &selectors.location_fallback)?;
    let about = text_with_fallback(&document, &selectors.about, &selectors.about_fallback)?;

    let mut experience = Vec::new();
    let experience_section = parse_selector(&selectors.experience_section)?;
    if let Some(section) = document.select(&experience_section).next() {
        for item in section.select(&list_item) {
            let Some(title) = first_text(item, &entry_title) else {
                continue;
            };
            let company = first_text(item, &entry_subtitle).and_then(|raw| clean_company(&raw));
            let duration = first_text(item, &entry_detail);
            experience.push(Experience {
                title,
                company,
                duration,
            });
        }
    }

    let mut education = Vec::new();
    let education_section = parse_selector(&selectors.education_section)?;
    if let Some(section) = document.select(&education_section).next() {
        for item in section.select(&list_item) {
            let Some(school) = first_text(item, &entry_title) else {
                continue;
            };
            education.push(Education {
                school,
                degree: first_text(item, &entry_subtitle),
                field: first_text(item, &entry_detail),
            });
        }
    }

    let skill_selector = parse_selector(&selectors.skill)?;
    let mut skills: Vec<String> = Vec::new();
    for skill in document.select(&skill_selector).filter_map(clean_text) {
        if !skills.contains(&skill) {
            skills.push(skill);
        }
    }

    debug!(
        name = name.as_deref().unwrap_or("-"),
        experience = experience.len(),
        education = education.len(),
        skills = skills.len(),
        "Profile extracted"
    );

    Ok(Profile {
        name,
        location,
        about,
        experience,
        education,
        skills,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.linkedin.com";

    const LISTING: &str = r#"
        <html><body>
          <ul>
            <li><a href="https://www.linkedin.com/in/ada-lovelace?miniProfileUrn=abc">Ada</a></li>
            <li><a href="/in/charles-babbage/">Charles</a></li>
            <li><a href="https://www.linkedin.com/in/ada-lovelace?trk=people">Ada again</a></li>
            <li><a href="https://www.linkedin.com/company/engines/">Company</a></li>
            <li><a>no target</a></li>
          </ul>
        </body></html>
    "#;

    const PROFILE: &str = r#"
        <html><body>
          <h1 data-test-id="profile-content__title">  Ada Lovelace </h1>
          <div class="top-card-layout__entity-info-container">
            <span class="top-card-layout__locality">London, England</span>
          </div>
          <section class="summary-card__content">
            <div class="core-section-container__content"> Poet of mathematics. </div>
          </section>
          <section class="experience-section">
            <ul>
              <li class="pvs-list__item">
                <div class="pvs-entity__content-wrapper">
                  <div class="t-bold">Analyst</div>
                  <span class="t-normal">Engines Ltd Full-time</span>
                  <span class="t-normal">1842 - 1843</span>
                </div>
              </li>
              <li class="pvs-list__item">
                <div class="pvs-entity__content-wrapper">
                  <span class="t-normal">Untitled entry</span>
                </div>
              </li>
              <li class="pvs-list__item">
                <div class="pvs-entity__content-wrapper">
                  <div class="t-bold">Translator</div>
                  <span class="t-normal">Scientific Memoirs</span>
                </div>
              </li>
            </ul>
          </section>
          <section class="education-section">
            <ul>
              <li class="pvs-list__item">
                <div class="pvs-entity__content-wrapper">
                  <div class="t-bold">Home tutoring</div>
                  <span class="t-normal">Private study</span>
                  <span class="t-normal">Mathematics</span>
                </div>
              </li>
            </ul>
          </section>
          <ul>
            <li class="pv-skill-category-list__item"><span class="t-bold">Mathematics</span></li>
            <li class="pv-skill-category-list__item"><span class="t-bold">Analysis</span></li>
            <li class="pv-skill-category-list__item"><span class="t-bold">Mathematics</span></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn test_profile_links_are_absolute_and_unique() {
        let urls = extract_profile_links(LISTING, BASE, &PeopleSelectors::default()).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://www.linkedin.com/in/ada-lovelace".to_string(),
                "https://www.linkedin.com/in/charles-babbage/".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_listing_has_no_links() {
        let urls = extract_profile_links("<html></html>", BASE, &PeopleSelectors::default()).unwrap();
        assert!(urls.is_empty());
    }

    #[test]
    fn test_invalid_selector_is_an_error() {
        let selectors = PeopleSelectors {
            profile_link: "a[[".to_string(),
            ..PeopleSelectors::default()
        };
        assert!(extract_profile_links(LISTING, BASE, &selectors).is_err());
    }

    #[test]
    fn test_company_loses_employment_type() {
        assert_eq!(clean_company("Engines Ltd · Full-time").as_deref(), Some("Engines Ltd ·"));
        assert_eq!(clean_company("Acme part-time 2 yrs").as_deref(), Some("Acme"));
        assert_eq!(clean_company("Contractors Guild").as_deref(), Some("Contractors Guild"));
        assert_eq!(clean_company("Freelance"), None);
    }

    #[test]
    fn test_profile_fields_use_fallbacks() {
        let profile = extract_profile(PROFILE, &ProfileSelectors::default()).unwrap();

        assert_eq!(profile.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(profile.location.as_deref(), Some("London, England"));
        assert_eq!(profile.about.as_deref(), Some("Poet of mathematics."));
    }

    #[test]
    fn test_profile_experience_and_education() {
        let profile = extract_profile(PROFILE, &ProfileSelectors::default()).unwrap();

        assert_eq!(profile.experience.len(), 2);
        assert_eq!(profile.experience[0].title, "Analyst");
        assert_eq!(profile.experience[0].company.as_deref(), Some("Engines Ltd"));
        assert_eq!(profile.experience[0].duration.as_deref(), Some("1842 - 1843"));
        assert_eq!(profile.experience[1].title, "Translator");
        assert_eq!(profile.experience[1].duration, None);

        assert_eq!(profile.education.len(), 1);
        assert_eq!(profile.education[0].school, "Home tutoring");
        assert_eq!(profile.education[0].degree.as_deref(), Some("Private study"));
        assert_eq!(profile.education[0].field.as_deref(), Some("Mathematics"));
    }

    #[test]
    fn test_profile_skills_are_deduplicated() {
        let profile = extract_profile(PROFILE, &ProfileSelectors::default()).unwrap();
        assert_eq!(profile.skills, vec!["Mathematics".to_string(), "Analysis".to_string()]);
    }

    #[test]
    fn test_blank_page_gives_empty_profile() {
        let profile = extract_profile("<html><body></body></html>", &ProfileSelectors::default())
            .unwrap();
        assert_eq!(profile, Profile::default());
    }
}
