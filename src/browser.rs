use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::config::BrowserConfig;
use crate::error::SessionError;

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Locator::Css(selector.to_string())
    }

    pub fn xpath(expr: &str) -> Self {
        Locator::XPath(expr.to_string())
    }

    fn by(&self) -> By {
        match self {
            Locator::Css(s) => By::Css(s.as_str()),
            Locator::XPath(s) => By::XPath(s.as_str()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{}", s),
            Locator::XPath(s) => write!(f, "xpath:{}", s),
        }
    }
}

/// A single, stateful browser tab. Every lookup takes an explicit timeout.
pub trait BrowsingSession {
    type Element;

    fn navigate(&mut self, url: &str) -> Result<(), SessionError>;
    fn current_url(&mut self) -> Result<String, SessionError>;
    fn find(&mut self, locator: &Locator, timeout: Duration) -> Result<Self::Element, SessionError>;
    /// Like `find`, but also waits until the element is displayed and enabled.
    fn find_clickable(&mut self, locator: &Locator, timeout: Duration) -> Result<Self::Element, SessionError>;
    /// Returns an empty list, not an error, when nothing renders in time.
    fn find_all(&mut self, locator: &Locator, timeout: Duration) -> Result<Vec<Self::Element>, SessionError>;
    fn click(&mut self, element: &Self::Element) -> Result<(), SessionError>;
    fn type_text(&mut self, element: &Self::Element, text: &str) -> Result<(), SessionError>;
    fn text(&mut self, element: &Self::Element) -> Result<String, SessionError>;
    fn attribute(&mut self, element: &Self::Element, name: &str) -> Result<Option<String>, SessionError>;
}

/// Polls `probe` until it yields a value, fails fatally, or `timeout` elapses.
///
/// Non-fatal probe errors count as "not there yet". The wait never exceeds
/// `timeout` by more than one `interval`.
pub fn poll_until<T, F>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, SessionError>
where
    F: FnMut() -> Result<Option<T>, SessionError>,
{
    let started = Instant::now();
    loop {
        match probe() {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("still waiting for {}: {}", what, e),
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(SessionError::Timeout {
                what: what.to_string(),
                waited: elapsed,
            });
        }
        thread::sleep(interval.min(timeout - elapsed));
    }
}

/// WebDriver-backed session. Owns its own runtime so callers stay synchronous.
pub struct WebDriverSession {
    runtime: Runtime,
    driver: WebDriver,
    poll_interval: Duration,
}

impl WebDriverSession {
    pub fn connect(config: &BrowserConfig, poll_interval: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime for WebDriver")?;

        info!("Connecting to WebDriver at {}", config.webdriver_url);
        let driver = runtime
            .block_on(async {
                let mut caps = DesiredCapabilities::chrome();
                for arg in &config.chrome_args {
                    caps.add_arg(arg)?;
                }
                if config.headless {
                    caps.add_arg("--headless=new")?;
                }
                WebDriver::new(config.webdriver_url.as_str(), caps).await
            })
            .with_context(|| {
                format!(
                    "Failed to start a browser session. Make sure chromedriver is running at {}",
                    config.webdriver_url
                )
            })?;

        Ok(Self {
            runtime,
            driver,
            poll_interval,
        })
    }

    pub fn quit(self) -> Result<()> {
        let Self { runtime, driver, .. } = self;
        runtime
            .block_on(driver.quit())
            .context("Failed to close browser session")
    }
}

impl BrowsingSession for WebDriverSession {
    type Element = WebElement;

    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        debug!("Navigating to {}", url);
        self.runtime.block_on(self.driver.goto(url)).map_err(classify)
    }

    fn current_url(&mut self) -> Result<String, SessionError> {
        self.runtime
            .block_on(self.driver.current_url())
            .map(|url| url.to_string())
            .map_err(classify)
    }

    fn find(&mut self, locator: &Locator, timeout: Duration) -> Result<WebElement, SessionError> {
        let (runtime, driver) = (&self.runtime, &self.driver);
        poll_until(&locator.to_string(), timeout, self.poll_interval, || {
            match runtime.block_on(driver.find(locator.by())) {
                Ok(element) => Ok(Some(element)),
                Err(e) => Err(classify(e)),
            }
        })
    }

    fn find_clickable(&mut self, locator: &Locator, timeout: Duration) -> Result<WebElement, SessionError> {
        let (runtime, driver) = (&self.runtime, &self.driver);
        poll_until(&locator.to_string(), timeout, self.poll_interval, || {
            runtime.block_on(async {
                let element = driver.find(locator.by()).await?;
                let clickable = element.is_clickable().await?;
                Ok::<_, WebDriverError>(clickable.then_some(element))
            })
            .map_err(classify)
        })
    }

    fn find_all(&mut self, locator: &Locator, timeout: Duration) -> Result<Vec<WebElement>, SessionError> {
        let (runtime, driver) = (&self.runtime, &self.driver);
        let found = poll_until(&locator.to_string(), timeout, self.poll_interval, || {
            match runtime.block_on(driver.find_all(locator.by())) {
                Ok(elements) if !elements.is_empty() => Ok(Some(elements)),
                Ok(_) => Ok(None),
                Err(e) => Err(classify(e)),
            }
        });
        match found {
            Ok(elements) => Ok(elements),
            Err(SessionError::Timeout { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn click(&mut self, element: &WebElement) -> Result<(), SessionError> {
        self.runtime.block_on(element.click()).map_err(classify)
    }

    fn type_text(&mut self, element: &WebElement, text: &str) -> Result<(), SessionError> {
        self.runtime.block_on(element.send_keys(text)).map_err(classify)
    }

    fn text(&mut self, element: &WebElement) -> Result<String, SessionError> {
        self.runtime.block_on(element.text()).map_err(classify)
    }

    fn attribute(&mut self, element: &WebElement, name: &str) -> Result<Option<String>, SessionError> {
        self.runtime.block_on(element.attr(name)).map_err(classify)
    }
}

const DEAD_SESSION_MARKERS: &[&str] = &[
    "invalid session id",
    "no such window",
    "session deleted",
    "chrome not reachable",
    "connection refused",
    "error sending request",
];

fn classify(err: WebDriverError) -> SessionError {
    classify_message(err.to_string())
}

fn classify_message(message: String) -> SessionError {
    let lower = message.to_lowercase();
    if DEAD_SESSION_MARKERS.iter().any(|marker| lower.contains(marker)) {
        SessionError::Unavailable(message)
    } else {
        SessionError::Interaction(message)
    }
}
