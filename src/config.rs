use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::browser::Locator;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resume_path: Option<PathBuf>,
    pub site: SiteConfig,
    pub search: SearchConfig,
    pub browser: BrowserConfig,
    pub timeouts: Timeouts,
    pub llm: LlmConfig,
    pub ledger: LedgerConfig,
    pub pipeline: PipelineConfig,
    pub selectors: Selectors,
}

impl Config {
    /// Reads the TOML config at `path`, or the default location when `None`.
    /// A missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "autoapply")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub login_url: String,
    pub search_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            login_url: "https://www.linkedin.com/login".to_string(),
            search_url: "https://www.linkedin.com/jobs/search/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub keywords: String,
    pub location: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keywords: "Data Scientist".to_string(),
            location: "India".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// chromedriver (or Selenium) endpoint.
    pub webdriver_url: String,
    pub headless: bool,
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: false,
            chrome_args: vec![
                "--start-maximized".to_string(),
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-gpu".to_string(),
                "--no-sandbox".to_string(),
            ],
        }
    }
}

/// Wait budgets, in seconds unless noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub results_secs: u64,
    pub navigation_secs: u64,
    pub eligibility_secs: u64,
    pub field_secs: u64,
    pub form_secs: u64,
    pub submit_secs: u64,
    pub login_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            results_secs: 10,
            navigation_secs: 10,
            eligibility_secs: 10,
            field_secs: 3,
            form_secs: 10,
            submit_secs: 10,
            login_secs: 15,
            poll_interval_ms: 250,
        }
    }
}

impl Timeouts {
    pub fn results(&self) -> Duration {
        Duration::from_secs(self.results_secs)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    pub fn eligibility(&self) -> Duration {
        Duration::from_secs(self.eligibility_secs)
    }

    /// Optional fields: description, cover letter input.
    pub fn field(&self) -> Duration {
        Duration::from_secs(self.field_secs)
    }

    pub fn form(&self) -> Duration {
        Duration::from_secs(self.form_secs)
    }

    pub fn submit(&self) -> Duration {
        Duration::from_secs(self.submit_secs)
    }

    pub fn login(&self) -> Duration {
        Duration::from_secs(self.login_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Short model name, see `ai::resolve_model`.
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Cap on characters of description and resume sent in the prompt.
    pub max_prompt_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_tokens: 500,
            timeout_secs: 60,
            max_prompt_chars: 12000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: Option<PathBuf>,
    pub log_skipped: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: None,
            log_skipped: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Random pause between postings, in milliseconds.
    pub pause_min_ms: u64,
    pub pause_max_ms: u64,
    #[serde(skip)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub results_container: Locator,
    pub posting_link: Locator,
    pub detail_landmark: Locator,
    pub quick_apply: Locator,
    pub job_title: Locator,
    pub company_name: Locator,
    pub description: Locator,
    pub application_form: Locator,
    pub cover_letter_field: Locator,
    pub submit: Locator,
    pub login_username: Locator,
    pub login_password: Locator,
    pub login_submit: Locator,
    pub login_landmark: Locator,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            results_container: Locator::css(".jobs-search-results-list"),
            posting_link: Locator::css(".job-card-list__title"),
            detail_landmark: Locator::css(".jobs-unified-top-card"),
            quick_apply: Locator::xpath(
                r#"//button[contains(@class, "artdeco-button") and contains(@aria-label, "Easy Apply")]"#,
            ),
            job_title: Locator::css(".jobs-unified-top-card__job-title"),
            company_name: Locator::css(".jobs-unified-top-card__company-name"),
            description: Locator::css(".jobs-description"),
            application_form: Locator::css(".jobs-easy-apply-modal"),
            cover_letter_field: Locator::xpath(r#"//textarea[@name="coverLetter"]"#),
            submit: Locator::xpath(r#"//button[@type="submit"]"#),
            login_username: Locator::css("#username"),
            login_password: Locator::css("#password"),
            login_submit: Locator::xpath(r#"//button[@type="submit"]"#),
            login_landmark: Locator::css(".global-nav"),
        }
    }
}
