// src/carrier/mod.rs
use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use std::{collections::BTreeMap, fmt, panic::AssertUnwindSafe, sync::Arc};
use tracing::{debug, instrument, warn};

use crate::config::Settings;
use crate::eta::{extract_eta, ETA_NOT_FOUND};

pub mod one;

pub use one::OneLineTracker;

/// Raw Info for carriers without a registered tracker.
pub const UNSUPPORTED_RAW_INFO: &str = "Only ONE Line supported in this version";
/// ETA column for carriers without a registered tracker.
pub const UNSUPPORTED_ETA: &str = "Unsupported carrier";
/// Raw Info prefix for a failed fetch.
pub const FETCH_ERROR_PREFIX: &str = "Error fetching: ";

/// A carrier's public tracking site.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Carrier code this tracker answers for (matched case-insensitively).
    fn carrier(&self) -> &str;

    /// Look up `identifier` and return the visible text of the result region.
    async fn fetch_tracking_page(&self, identifier: &str) -> Result<String>;
}

/// What a single dispatch produced. Never an error: a failed fetch is data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The tracker returned page text.
    Fetched(String),
    /// The tracker failed; holds the error chain.
    Failed(String),
    /// No tracker is registered for the carrier code.
    Unsupported,
}

impl Lookup {
    pub fn raw_info(&self) -> String {
        match self {
            Lookup::Fetched(text) => text.clone(),
            Lookup::Failed(reason) => format!("{}{}", FETCH_ERROR_PREFIX, reason),
            Lookup::Unsupported => UNSUPPORTED_RAW_INFO.to_string(),
        }
    }

    /// ETA column value. Error text is never scanned for an ETA line.
    pub fn eta(&self) -> String {
        match self {
            Lookup::Fetched(text) => extract_eta(text),
            Lookup::Failed(_) => ETA_NOT_FOUND.to_string(),
            Lookup::Unsupported => UNSUPPORTED_ETA.to_string(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Lookup::Failed(_))
    }
}

/// Carrier code → tracker. Codes without an entry resolve to `Lookup::Unsupported`.
#[derive(Clone, Default)]
pub struct CarrierRegistry {
    trackers: BTreeMap<String, Arc<dyn Tracker>>,
}

impl fmt::Debug for CarrierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CarrierRegistry")
            .field("carriers", &self.carriers())
            .finish()
    }
}

impl CarrierRegistry {
    /// An empty registry: every carrier is unsupported.
    pub fn new() -> Self {
        Self::default()
    }

    /// The trackers shipped with this crate, configured from `settings`.
    pub fn with_defaults(settings: &Settings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(OneLineTracker::new(
            settings.browser.clone(),
            settings.one.clone(),
        )));
        registry
    }

    /// Add (or replace) the tracker for `tracker.carrier()`.
    pub fn register(&mut self, tracker: Arc<dyn Tracker>) -> Option<Arc<dyn Tracker>> {
        let code = normalize_code(tracker.carrier());
        self.trackers.insert(code, tracker)
    }

    pub fn get(&self, carrier: &str) -> Option<&Arc<dyn Tracker>> {
        self.trackers.get(&normalize_code(carrier))
    }

    /// Registered carrier codes, sorted.
    pub fn carriers(&self) -> Vec<&str> {
        self.trackers.keys().map(String::as_str).collect()
    }

    /// Look up one master B/L. Always returns; tracker errors and panics
    /// become `Lookup::Failed`.
    #[instrument(level = "debug", skip(self))]
    pub async fn dispatch(&self, carrier: &str, identifier: &str) -> Lookup {
        let Some(tracker) = self.get(carrier) else {
            debug!("no tracker registered");
            return Lookup::Unsupported;
        };

        let identifier = identifier.trim();
        match AssertUnwindSafe(tracker.fetch_tracking_page(identifier))
            .catch_unwind()
            .await
        {
            Ok(Ok(text)) => Lookup::Fetched(text),
            Ok(Err(e)) => {
                warn!(error = %format!("{:#}", e), "lookup failed");
                Lookup::Failed(format!("{:#}", e))
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "tracker panicked".to_string());
                warn!(%reason, "tracker panicked");
                Lookup::Failed(reason)
            }
        }
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Canned tracker that records every identifier it is asked for.
    pub(crate) struct StubTracker {
        code: &'static str,
        reply: Box<dyn Fn(&str) -> Result<String> + Send + Sync>,
        pub calls: Mutex<Vec<String>>,
    }

    impl StubTracker {
        pub(crate) fn new(
            code: &'static str,
            reply: impl Fn(&str) -> Result<String> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                code,
                reply: Box::new(reply),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Tracker for StubTracker {
        fn carrier(&self) -> &str {
            self.code
        }

        async fn fetch_tracking_page(&self, identifier: &str) -> Result<String> {
            self.calls.lock().unwrap().push(identifier.to_string());
            (self.reply)(identifier)
        }
    }

    struct PanickingTracker;

    #[async_trait]
    impl Tracker for PanickingTracker {
        fn carrier(&self) -> &str {
            "ONE"
        }

        async fn fetch_tracking_page(&self, _identifier: &str) -> Result<String> {
            panic!("selector engine exploded")
        }
    }

    #[tokio::test]
    async fn test_dispatch_fetched_extracts_eta() {
        let stub = StubTracker::new("ONE", |_| {
            Ok("Status: In Transit\nETA: 2025-05-01\nPort: LAX".to_string())
        });
        let mut registry = CarrierRegistry::new();
        registry.register(stub.clone());

        let lookup = registry.dispatch(" one ", " ONEYXXXX1234567 ").await;
        assert_eq!(lookup.eta(), "ETA: 2025-05-01");
        assert_eq!(lookup.raw_info(), "Status: In Transit\nETA: 2025-05-01\nPort: LAX");
        assert_eq!(*stub.calls.lock().unwrap(), vec!["ONEYXXXX1234567"]);
    }

    #[tokio::test]
    async fn test_dispatch_unsupported_never_calls_tracker() {
        let stub = StubTracker::new("ONE", |_| Ok(String::new()));
        let mut registry = CarrierRegistry::new();
        registry.register(stub.clone());

        let lookup = registry.dispatch("MSK", "X").await;
        assert_eq!(lookup, Lookup::Unsupported);
        assert_eq!(lookup.raw_info(), "Only ONE Line supported in this version");
        assert_eq!(lookup.eta(), "Unsupported carrier");
        assert!(stub.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_becomes_data() {
        let stub = StubTracker::new("ONE", |_| {
            Err(anyhow!("Timeout 30000ms exceeded").context("loading tracking page"))
        });
        let mut registry = CarrierRegistry::new();
        registry.register(stub);

        let lookup = registry.dispatch("ONE", "ONEY1").await;
        assert!(lookup.is_failed());
        let raw = lookup.raw_info();
        assert!(raw.starts_with("Error fetching:"), "{}", raw);
        assert!(raw.contains("Timeout 30000ms exceeded"), "{}", raw);
        assert_eq!(lookup.eta(), "N/A");
    }

    #[tokio::test]
    async fn test_dispatch_failure_with_eta_like_words_stays_na() {
        // "DETAILS" contains "ETA" once upper-cased
        let stub = StubTracker::new("ONE", |_| Err(anyhow!("no details returned")));
        let mut registry = CarrierRegistry::new();
        registry.register(stub);

        let lookup = registry.dispatch("ONE", "ONEY1").await;
        assert_eq!(lookup.eta(), "N/A");
    }

    #[tokio::test]
    async fn test_dispatch_catches_panics() {
        let mut registry = CarrierRegistry::new();
        registry.register(Arc::new(PanickingTracker));

        let lookup = registry.dispatch("ONE", "ONEY1").await;
        assert_eq!(
            lookup,
            Lookup::Failed("selector engine exploded".to_string())
        );
    }

    #[test]
    fn test_registry_defaults_and_replacement() {
        let registry = CarrierRegistry::with_defaults(&Settings::default());
        assert_eq!(registry.carriers(), vec!["ONE"]);
        assert!(registry.get("one").is_some());
        assert!(registry.get("MSK").is_none());

        let mut registry = registry;
        let previous = registry.register(StubTracker::new("one", |_| Ok(String::new())));
        assert!(previous.is_some());
        assert_eq!(registry.carriers().len(), 1);
    }
}
