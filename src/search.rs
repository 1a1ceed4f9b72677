use anyhow::{Context, Result};
use reqwest::Url;
use tracing::info;

use crate::browser::BrowsingSession;
use crate::config::{SearchConfig, SiteConfig};

/// Builds the results URL, restricted to postings with the expedited apply path.
pub fn search_url(base: &str, keywords: &str, location: &str) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid search URL: {}", base))?;
    url.query_pairs_mut()
        .append_pair("keywords", keywords)
        .append_pair("location", location)
        .append_pair("f_AL", "true");
    Ok(url)
}

pub fn open_results<S: BrowsingSession>(
    session: &mut S,
    site: &SiteConfig,
    search: &SearchConfig,
) -> Result<()> {
    let url = search_url(&site.search_url, &search.keywords, &search.location)?;
    session
        .navigate(url.as_str())
        .context("Failed to open search results")?;
    info!(
        "Job search opened for '{}' in {} (expedited apply only)",
        search.keywords, search.location
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeSession;

    #[test]
    fn test_search_url_encodes_terms() {
        let url = search_url("https://www.linkedin.com/jobs/search/", "Data Scientist", "São Paulo").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.linkedin.com/jobs/search/?keywords=Data+Scientist&location=S%C3%A3o+Paulo&f_AL=true"
        );
    }

    #[test]
    fn test_search_url_rejects_garbage_base() {
        assert!(search_url("not a url", "x", "y").is_err());
    }

    #[test]
    fn test_open_results_navigates() {
        let mut session = FakeSession::new();
        let site = SiteConfig {
            login_url: String::new(),
            search_url: "https://jobs.example/search".into(),
        };
        let search = SearchConfig {
            keywords: "rust".into(),
            location: "remote".into(),
        };
        open_results(&mut session, &site, &search).unwrap();
        assert_eq!(
            session.visited,
            vec!["https://jobs.example/search?keywords=rust&location=remote&f_AL=true"]
        );
    }
}
