//! Scripted in-memory browsing session used by the pipeline tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::browser::{BrowsingSession, Locator};
use crate::error::SessionError;

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub id: String,
    pub text: String,
    pub attrs: HashMap<String, String>,
    /// Rendered but not clickable.
    pub disabled: bool,
}

impl FakeElement {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }
}

/// What a URL renders: locator -> matching elements.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    elements: HashMap<String, Vec<FakeElement>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: &Locator, element: FakeElement) -> Self {
        self.elements.entry(locator.to_string()).or_default().push(element);
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeSession {
    pages: HashMap<String, FakePage>,
    current: Option<String>,
    /// Every call fails as if the browser crashed.
    pub dead: bool,
    /// Navigating to this URL kills the session.
    pub dies_on: Option<String>,
    /// Navigating to these URLs fails without killing the session.
    pub unreachable: HashSet<String>,
    /// Clicking or typing into elements with these ids fails, as with a stale element.
    pub stale: HashSet<String>,
    pub visited: Vec<String>,
    pub clicked: Vec<String>,
    pub typed: Vec<(String, String)>,
    /// Sum of timeouts callers were willing to wait on lookups that failed.
    pub waited: Duration,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// Start the session already on `url`.
    pub fn at(mut self, url: &str) -> Self {
        self.current = Some(url.to_string());
        self
    }

    fn alive(&self) -> Result<(), SessionError> {
        if self.dead {
            Err(SessionError::Unavailable("invalid session id".into()))
        } else {
            Ok(())
        }
    }

    fn interact(&self, element: &FakeElement) -> Result<(), SessionError> {
        self.alive()?;
        if self.stale.contains(&element.id) {
            return Err(SessionError::Interaction(format!(
                "stale element reference: {}",
                element.id
            )));
        }
        Ok(())
    }

    fn timed_out(&mut self, locator: &Locator, timeout: Duration) -> SessionError {
        self.waited += timeout;
        SessionError::Timeout {
            what: locator.to_string(),
            waited: timeout,
        }
    }

    fn lookup(&self, locator: &Locator) -> Vec<FakeElement> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .and_then(|page| page.elements.get(&locator.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

impl BrowsingSession for FakeSession {
    type Element = FakeElement;

    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.alive()?;
        if self.dies_on.as_deref() == Some(url) {
            self.dead = true;
            return self.alive();
        }
        if self.unreachable.contains(url) {
            return Err(SessionError::Interaction(format!("net::ERR_CONNECTION_RESET at {}", url)));
        }
        self.visited.push(url.to_string());
        self.current = Some(url.to_string());
        Ok(())
    }

    fn current_url(&mut self) -> Result<String, SessionError> {
        self.alive()?;
        Ok(self.current.clone().unwrap_or_default())
    }

    fn find(&mut self, locator: &Locator, timeout: Duration) -> Result<FakeElement, SessionError> {
        self.alive()?;
        match self.lookup(locator).into_iter().next() {
            Some(element) => Ok(element),
            None => Err(self.timed_out(locator, timeout)),
        }
    }

    fn find_clickable(&mut self, locator: &Locator, timeout: Duration) -> Result<FakeElement, SessionError> {
        self.alive()?;
        match self.lookup(locator).into_iter().find(|e| !e.disabled) {
            Some(element) => Ok(element),
            None => Err(self.timed_out(locator, timeout)),
        }
    }

    fn find_all(&mut self, locator: &Locator, timeout: Duration) -> Result<Vec<FakeElement>, SessionError> {
        self.alive()?;
        let found = self.lookup(locator);
        if found.is_empty() {
            self.waited += timeout;
        }
        Ok(found)
    }

    fn click(&mut self, element: &FakeElement) -> Result<(), SessionError> {
        self.interact(element)?;
        self.clicked.push(element.id.clone());
        Ok(())
    }

    fn type_text(&mut self, element: &FakeElement, text: &str) -> Result<(), SessionError> {
        self.interact(element)?;
        self.typed.push((element.id.clone(), text.to_string()));
        Ok(())
    }

    fn text(&mut self, element: &FakeElement) -> Result<String, SessionError> {
        self.alive()?;
        Ok(element.text.clone())
    }

    fn attribute(&mut self, element: &FakeElement, name: &str) -> Result<Option<String>, SessionError> {
        self.alive()?;
        Ok(element.attrs.get(name).cloned())
    }
}
