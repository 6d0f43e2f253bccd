use regex::Regex;
use std::sync::LazyLock;

static COMPANY_PEOPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://www\.linkedin\.com/company/[^/?#]+/people/?(?:[?#].*)?$")
        .unwrap_or_else(|e| panic!("invalid company people pattern: {e}"))
});

/// What kind of page a URL points at, as far as harvesting is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// A company's people listing, the only page the listing flow runs on
    CompanyPeople,
    /// Some other page of the site
    SiteOther,
    /// A page outside the site
    Foreign,
}

impl PageKind {
    pub fn classify(url: &str) -> Self {
        if COMPANY_PEOPLE.is_match(url.trim()) {
            Self::CompanyPeople
        } else if url.contains("www.linkedin.com/") {
            Self::SiteOther
        } else {
            Self::Foreign
        }
    }

    /// Short human-readable hint describing what can be done on this page
    pub fn hint(self) -> &'static str {
        match self {
            Self::CompanyPeople => "Scrap data from this page",
            Self::SiteOther => "Not on a Company People page",
            Self::Foreign => "Not on LinkedIn",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_people_pages() {
        for url in [
            "https://www.linkedin.com/company/acme/people/",
            "https://www.linkedin.com/company/acme/people",
            "https://www.linkedin.com/company/acme/people/?keywords=rust",
            "https://www.linkedin.com/company/acme-corp/people#top",
        ] {
            assert_eq!(PageKind::classify(url), PageKind::CompanyPeople, "{url}");
        }
    }

    #[test]
    fn test_other_site_pages() {
        for url in [
            "https://www.linkedin.com/company/acme/",
            "https://www.linkedin.com/company/acme/people/extra",
            "https://www.linkedin.com/in/someone",
            "https://www.linkedin.com/feed/",
        ] {
            assert_eq!(PageKind::classify(url), PageKind::SiteOther, "{url}");
        }
    }

    #[test]
    fn test_foreign_pages() {
        assert_eq!(PageKind::classify("https://example.com/people/"), PageKind::Foreign);
        assert_eq!(PageKind::classify(""), PageKind::Foreign);
        assert_eq!(PageKind::Foreign.hint(), "Not on LinkedIn");
    }
}
