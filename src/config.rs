// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};
use url::Url;

use crate::sheet::{LoadOptions, DEFAULT_HEADER_ROW};

/// Run settings. Every field has a default, so an empty (or absent) YAML
/// file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// 0-based sheet row holding the column labels.
    pub header_row: usize,
    /// Worksheet to read; the first sheet when unset.
    pub sheet: Option<String>,
    pub browser: BrowserSettings,
    pub one: OneLineSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            header_row: DEFAULT_HEADER_ROW,
            sheet: None,
            browser: BrowserSettings::default(),
            one: OneLineSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Budget for launching Chromium and for each CDP request.
    pub launch_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            launch_timeout_ms: 30_000,
        }
    }
}

impl BrowserSettings {
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }
}

/// Where the ONE tracking form lives and how to read its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OneLineSettings {
    pub tracking_url: String,
    /// CSS selector of the tracking-number input.
    pub input_selector: String,
    /// XPath of the search button.
    pub submit_xpath: String,
    /// CSS selector of the region holding the tracking result.
    pub result_selector: String,
    pub settle: SettleSettings,
}

impl Default for OneLineSettings {
    fn default() -> Self {
        Self {
            tracking_url: "https://ecommerce.one-line.com/one-ecom/en/ecommerce/track".into(),
            input_selector: "input[name='searchNo']".into(),
            submit_xpath: "//button[contains(normalize-space(.), 'Track')]".into(),
            result_selector: ".result-info".into(),
            settle: SettleSettings::default(),
        }
    }
}

/// How long to wait for the result region after submitting the search.
///
/// The page gives no completion signal, so we sleep `min_wait_ms` and then
/// poll every `poll_interval_ms` until the region has text, giving up after
/// `timeout_ms` (counted from the submit click).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettleSettings {
    pub min_wait_ms: u64,
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for SettleSettings {
    fn default() -> Self {
        Self {
            min_wait_ms: 2_000,
            poll_interval_ms: 500,
            timeout_ms: 15_000,
        }
    }
}

impl SettleSettings {
    pub fn min_wait(&self) -> Duration {
        Duration::from_millis(self.min_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Settings {
    /// Read settings from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(text)?;
        Ok(settings)
    }

    /// Reject settings that could never produce a lookup.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.one.tracking_url)
            .with_context(|| format!("invalid tracking_url `{}`", self.one.tracking_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("tracking_url must be http(s), got `{}`", url.scheme());
        }

        let settle = &self.one.settle;
        if settle.poll_interval_ms == 0 {
            bail!("settle.poll_interval_ms must be positive");
        }
        if settle.timeout_ms < settle.min_wait_ms {
            bail!(
                "settle.timeout_ms ({}) is shorter than settle.min_wait_ms ({})",
                settle.timeout_ms,
                settle.min_wait_ms
            );
        }
        for (name, value) in [
            ("input_selector", &self.one.input_selector),
            ("submit_xpath", &self.one.submit_xpath),
            ("result_selector", &self.one.result_selector),
        ] {
            if value.trim().is_empty() {
                bail!("one.{} must not be empty", name);
            }
        }
        Ok(())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            sheet: self.sheet.clone(),
            header_row: self.header_row,
        }
    }
}
