//! Settings structures for termsearch configuration

use crate::search::{ContentType, Filters};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Convert a timeout given in seconds. Zero, negative, NaN, infinite and
/// out of range values are rejected.
pub fn seconds(field: &str, secs: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => bail!("{} must be a positive number of seconds, got {}", field, secs),
    }
}

/// Main settings structure, loaded from `settings.yml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub search: SearchSettings,
    pub cache: CacheSettings,
    pub history: HistorySettings,
    pub outgoing: OutgoingSettings,
    pub display: DisplaySettings,
    pub providers: Vec<ProviderConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            search: SearchSettings::default(),
            cache: CacheSettings::default(),
            history: HistorySettings::default(),
            outgoing: OutgoingSettings::default(),
            display: DisplaySettings::default(),
            providers: default_providers(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables (TERMSEARCH_* prefix)
    pub fn merge_env(&mut self) {
        self.merge_vars(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key/value source
    pub fn merge_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("TERMSEARCH_DEBUG") {
            self.general.debug = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(val) = lookup("TERMSEARCH_RESULTS_PER_PAGE") {
            if let Ok(n) = val.parse() {
                self.search.results_per_page = n;
            }
        }
        if let Some(val) = lookup("TERMSEARCH_TIMEOUT") {
            if let Ok(secs) = val.parse() {
                self.set_provider_timeout(secs);
            }
        }
        if let Some(val) = lookup("TERMSEARCH_CACHE_TTL") {
            if let Ok(secs) = val.parse() {
                self.cache.ttl = secs;
            }
        }
        if let Some(val) = lookup("TERMSEARCH_USER_AGENT") {
            self.outgoing.user_agent = Some(val);
        }
    }

    /// Set the provider timeout, stretching the dispatch deadline if it
    /// would otherwise be shorter
    pub fn set_provider_timeout(&mut self, secs: f64) {
        self.search.provider_timeout = secs;
        if self.search.dispatch_timeout < secs {
            self.search.dispatch_timeout = secs * 2.0;
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.search.results_per_page == 0 {
            bail!("search.results_per_page must be at least 1");
        }
        if self.cache.max_entries == 0 {
            bail!("cache.max_entries must be at least 1");
        }
        if self.history.max_entries == 0 {
            bail!("history.max_entries must be at least 1");
        }
        seconds("search.provider_timeout", self.search.provider_timeout)?;
        seconds("search.dispatch_timeout", self.search.dispatch_timeout)?;
        seconds("outgoing.request_timeout", self.outgoing.request_timeout)?;
        if self.search.dispatch_timeout < self.search.provider_timeout {
            bail!(
                "search.dispatch_timeout ({}s) is shorter than search.provider_timeout ({}s)",
                self.search.dispatch_timeout,
                self.search.provider_timeout
            );
        }
        for provider in &self.providers {
            if provider.name.is_empty() {
                bail!("provider entries need a name");
            }
            if provider.requests_per_minute == Some(0) {
                bail!("provider {}: requests_per_minute must be at least 1", provider.name);
            }
            if let Some(secs) = provider.timeout {
                seconds(&format!("provider {}: timeout", provider.name), secs)?;
            }
        }
        Ok(())
    }

    /// Enable only providers of the given type
    pub fn enable_only(&mut self, provider_type: &str) {
        let mut found = false;
        for provider in &mut self.providers {
            provider.disabled = provider.provider != provider_type;
            found |= !provider.disabled;
        }
        if !found {
            self.providers.push(ProviderConfig {
                name: provider_type.to_string(),
                provider: provider_type.to_string(),
                content_types: ContentType::ALL.to_vec(),
                ..Default::default()
            });
        }
    }

    /// Get provider config by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Get all enabled providers, in configured order
    pub fn enabled_providers(&self) -> Vec<&ProviderConfig> {
        self.providers.iter().filter(|p| !p.disabled).collect()
    }

    pub fn provider_timeout(&self) -> Duration {
        seconds("search.provider_timeout", self.search.provider_timeout)
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        seconds("search.dispatch_timeout", self.search.dispatch_timeout)
            .unwrap_or(DEFAULT_DISPATCH_TIMEOUT)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl)
    }

    /// Where history is persisted, if anywhere
    pub fn history_path(&self) -> Option<PathBuf> {
        if !self.history.save_to_file {
            return None;
        }
        self.history
            .file
            .clone()
            .or_else(|| data_dir().map(|d| d.join("history.json")))
    }

    /// Where bookmarks are persisted
    pub fn bookmarks_path(&self) -> Option<PathBuf> {
        self.history
            .bookmarks_file
            .clone()
            .or_else(|| data_dir().map(|d| d.join("bookmarks.json")))
    }
}

fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("termsearch"))
}

/// General settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug logging
    pub debug: bool,
}

/// Search behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Results shown per page
    pub results_per_page: u32,
    /// Per provider fetch timeout in seconds
    pub provider_timeout: f64,
    /// Deadline for a whole dispatch in seconds
    pub dispatch_timeout: f64,
    /// Delay before retrying a timed out provider, in milliseconds
    pub retry_backoff_ms: u64,
    /// How long a rate limited provider is skipped, in seconds
    pub rate_limit_cooldown: u64,
    /// Filters a new session starts with
    pub default_filters: Filters,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            results_per_page: 10,
            provider_timeout: 5.0,
            dispatch_timeout: 10.0,
            retry_backoff_ms: 250,
            rate_limit_cooldown: 600,
            default_filters: Filters::default(),
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Time to live in seconds, measured from fetch time
    pub ttl: u64,
    /// Maximum number of cached pages
    pub max_entries: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: 3600,
            max_entries: 256,
        }
    }
}

/// History and bookmark settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Maximum number of history entries kept
    pub max_entries: usize,
    /// Persist history between sessions
    pub save_to_file: bool,
    /// History file (defaults to the user data directory)
    pub file: Option<PathBuf>,
    /// Bookmark file (defaults to the user data directory)
    pub bookmarks_file: Option<PathBuf>,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_entries: 100,
            save_to_file: true,
            file: None,
            bookmarks_file: None,
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Fixed user agent (none = random)
    pub user_agent: Option<String>,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
    /// Extra headers to send
    pub extra_headers: HashMap<String, String>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 5.0,
            user_agent: None,
            pool_maxsize: 20,
            verify_ssl: true,
            proxies: ProxySettings::default(),
            extra_headers: HashMap::new(),
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Console output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Snippets longer than this are cut with an ellipsis
    pub max_snippet_length: usize,
    /// Print result URLs
    pub show_urls: bool,
    /// Print which provider returned each result
    pub show_provider: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            max_snippet_length: 200,
            show_urls: true,
            show_provider: false,
        }
    }
}

/// Individual provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider name (unique identifier)
    pub name: String,
    /// Provider implementation to use
    pub provider: String,
    /// Content types this provider is asked for
    pub content_types: Vec<ContentType>,
    /// Whether provider is disabled
    pub disabled: bool,
    /// Custom timeout for this provider in seconds
    pub timeout: Option<f64>,
    /// Client-side quota
    pub requests_per_minute: Option<u32>,
    /// Override the upstream endpoint
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            provider: String::new(),
            content_types: vec![ContentType::Web],
            disabled: false,
            timeout: None,
            requests_per_minute: None,
            base_url: None,
        }
    }
}

/// Default provider configurations
fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "duckduckgo".to_string(),
            provider: "duckduckgo".to_string(),
            content_types: vec![ContentType::Web, ContentType::News],
            requests_per_minute: Some(30),
            ..Default::default()
        },
        ProviderConfig {
            name: "wikipedia".to_string(),
            provider: "wikipedia".to_string(),
            content_types: vec![ContentType::Web, ContentType::Academic],
            requests_per_minute: Some(60),
            ..Default::default()
        },
        ProviderConfig {
            name: "simulation".to_string(),
            provider: "simulation".to_string(),
            content_types: ContentType::ALL.to_vec(),
            disabled: true,
            ..Default::default()
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.search.results_per_page, 10);
        assert!(!settings.general.debug);
        assert!(settings.validate().is_ok());
        let enabled: Vec<&str> = settings
            .enabled_providers()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(enabled, vec!["duckduckgo", "wikipedia"]);
    }

    #[test]
    fn test_provider_lookup() {
        let settings = Settings::default();
        let wiki = settings.get_provider("wikipedia");
        assert!(wiki.is_some());
        assert!(wiki.unwrap().content_types.contains(&ContentType::Academic));
    }

    #[test]
    fn test_yaml_partial_sections() {
        let yaml = r#"
search:
  results_per_page: 5
  default_filters:
    safe_search: strict
    language: de
cache:
  ttl: 60
providers:
  - name: sim
    provider: simulation
    content_types: [web, news]
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.search.results_per_page, 5);
        assert_eq!(settings.search.provider_timeout, 5.0);
        assert_eq!(settings.cache.ttl, 60);
        assert_eq!(settings.cache.max_entries, 256);
        assert_eq!(settings.search.default_filters.language.as_deref(), Some("de"));
        assert_eq!(settings.providers.len(), 1);
        assert_eq!(settings.providers[0].content_types.len(), 2);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TERMSEARCH_RESULTS_PER_PAGE", "25"),
            ("TERMSEARCH_TIMEOUT", "12"),
            ("TERMSEARCH_CACHE_TTL", "30"),
            ("TERMSEARCH_USER_AGENT", "termsearch-test"),
            ("TERMSEARCH_DEBUG", "true"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.merge_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(settings.search.results_per_page, 25);
        assert_eq!(settings.search.provider_timeout, 12.0);
        assert_eq!(settings.search.dispatch_timeout, 24.0);
        assert_eq!(settings.cache.ttl, 30);
        assert_eq!(settings.outgoing.user_agent.as_deref(), Some("termsearch-test"));
        assert!(settings.general.debug);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.search.results_per_page = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.cache.max_entries = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.history.max_entries = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.search.dispatch_timeout = 1.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unusable_timeouts() {
        for secs in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e300] {
            let mut settings = Settings::default();
            settings.set_provider_timeout(secs);
            assert!(settings.validate().is_err(), "provider timeout {}", secs);
            assert_eq!(settings.provider_timeout(), Duration::from_secs(5));

            let mut settings = Settings::default();
            settings.outgoing.request_timeout = secs;
            assert!(settings.validate().is_err(), "request timeout {}", secs);

            let mut settings = Settings::default();
            settings.providers[0].timeout = Some(secs);
            let err = settings.validate().unwrap_err();
            assert!(err.to_string().contains("duckduckgo"));
        }
    }

    #[test]
    fn test_nan_timeout_from_environment_is_rejected() {
        let mut settings = Settings::default();
        settings.merge_vars(|k| (k == "TERMSEARCH_TIMEOUT").then(|| "NaN".to_string()));
        assert!(settings.search.provider_timeout.is_nan());
        assert!(settings.validate().is_err());
        assert_eq!(settings.dispatch_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_yaml_negative_provider_timeout_is_rejected() {
        let yaml = r#"
providers:
  - name: sim
    provider: simulation
    timeout: -1.0
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_enable_only_simulation() {
        let mut settings = Settings::default();
        settings.enable_only("simulation");
        let enabled: Vec<&str> = settings
            .enabled_providers()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(enabled, vec!["simulation"]);

        let mut settings = Settings {
            providers: vec![],
            ..Default::default()
        };
        settings.enable_only("simulation");
        assert_eq!(settings.enabled_providers().len(), 1);
    }
}
