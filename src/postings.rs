use std::collections::HashSet;

use reqwest::Url;
use tracing::{debug, info, warn};

use crate::browser::BrowsingSession;
use crate::config::{Selectors, Timeouts};
use crate::error::{LocateError, SessionError};
use crate::models::Posting;

/// Collects the postings rendered on the current results page.
///
/// A results list that renders with no entries yields an empty list. Only a
/// results container that never appears is an error.
pub fn locate_postings<S: BrowsingSession>(
    session: &mut S,
    selectors: &Selectors,
    timeouts: &Timeouts,
) -> Result<Vec<Posting>, LocateError> {
    match session.find(&selectors.results_container, timeouts.results()) {
        Ok(_) => {}
        Err(SessionError::Timeout { waited, .. }) => {
            return Err(LocateError::LocatorTimeout { waited });
        }
        Err(e) => return Err(LocateError::Session(e)),
    }

    let links = session
        .find_all(&selectors.posting_link, timeouts.results())
        .map_err(LocateError::Session)?;

    let base = session.current_url().ok().and_then(|u| Url::parse(&u).ok());

    let mut seen = HashSet::new();
    let mut postings = Vec::new();
    for link in &links {
        let href = match session.attribute(link, "href") {
            Ok(Some(href)) if !href.trim().is_empty() => href,
            Ok(_) => {
                debug!("Result entry has no link, skipping");
                continue;
            }
            Err(e) if e.is_fatal() => return Err(LocateError::Session(e)),
            Err(e) => {
                warn!("Could not read result link: {}", e);
                continue;
            }
        };

        let detail_url = resolve_link(base.as_ref(), href.trim());
        if seen.insert(detail_url.clone()) {
            postings.push(Posting { detail_url });
        }
    }

    info!("Found {} posting(s) on the results page", postings.len());
    Ok(postings)
}

fn resolve_link(base: Option<&Url>, href: &str) -> String {
    match base.and_then(|b| b.join(href).ok()) {
        Some(url) => url.to_string(),
        None => href.to_string(),
    }
}
