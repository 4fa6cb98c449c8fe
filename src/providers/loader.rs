//! Provider loader for building the registry from configuration

use super::duckduckgo::DuckDuckGo;
use super::http::HttpProvider;
use super::registry::ProviderRegistry;
use super::simulation::SimulationProvider;
use super::throttle::Throttle;
use super::traits::{HttpBackend, Provider};
use super::wikipedia::Wikipedia;
use crate::config::{seconds, ProviderConfig, Settings};
use crate::network::HttpClient;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds providers from settings
pub struct ProviderLoader;

impl ProviderLoader {
    /// Load all enabled providers from settings
    pub fn load(settings: &Settings) -> Result<ProviderRegistry> {
        let client = Arc::new(HttpClient::with_settings(&settings.outgoing)?);
        Self::load_with_client(settings, client)
    }

    /// Load providers sharing an existing HTTP client
    pub fn load_with_client(settings: &Settings, client: Arc<HttpClient>) -> Result<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();

        for config in &settings.providers {
            if config.disabled {
                info!("Skipping disabled provider: {}", config.name);
                continue;
            }

            let timeout = config
                .timeout
                .map(|secs| seconds(&format!("provider {}: timeout", config.name), secs))
                .transpose()?;

            match Self::create_provider(config, settings, &client) {
                Ok(provider) => {
                    info!("Loaded provider: {} ({})", config.name, config.provider);
                    registry.register(provider, timeout);
                }
                Err(e) => {
                    warn!("Failed to load provider {}: {}", config.name, e);
                }
            }
        }

        info!("Loaded {} providers", registry.len());
        Ok(registry)
    }

    fn create_provider(
        config: &ProviderConfig,
        settings: &Settings,
        client: &Arc<HttpClient>,
    ) -> Result<Arc<dyn Provider>> {
        let page_size = settings.search.results_per_page;
        let provider: Arc<dyn Provider> = match config.provider.as_str() {
            "duckduckgo" => {
                let backend = match config.base_url {
                    Some(ref url) => DuckDuckGo::with_base_url(url),
                    None => DuckDuckGo::new(),
                };
                Arc::new(Self::http(backend, config, client, page_size))
            }
            "wikipedia" => {
                let backend = match config.base_url {
                    Some(ref url) => Wikipedia::with_base_url(url),
                    None => Wikipedia::new(),
                };
                Arc::new(Self::http(backend, config, client, page_size))
            }
            "simulation" => Arc::new(
                SimulationProvider::new()
                    .with_id(&config.name)
                    .with_page_size(page_size),
            ),
            other => {
                return Err(anyhow::anyhow!("Unknown provider type: {}", other));
            }
        };

        if provider.content_types().is_empty() {
            return Err(anyhow::anyhow!(
                "provider {} serves none of its configured content types",
                config.name
            ));
        }

        Ok(provider)
    }

    fn http<B: HttpBackend>(
        backend: B,
        config: &ProviderConfig,
        client: &Arc<HttpClient>,
        page_size: u32,
    ) -> HttpProvider<B> {
        HttpProvider::new(backend, Arc::clone(client))
            .with_id(&config.name)
            .with_content_types(config.content_types.clone())
            .with_page_size(page_size)
            .with_throttle(config.requests_per_minute.and_then(Throttle::per_minute))
    }

    /// Get list of available provider types
    pub fn available_providers() -> Vec<&'static str> {
        vec!["duckduckgo", "wikipedia", "simulation"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ContentType;
    use std::time::Duration;

    #[test]
    fn test_load_defaults() {
        let registry = ProviderLoader::load(&Settings::default()).unwrap();
        assert_eq!(registry.ids(), vec!["duckduckgo", "wikipedia"]);
        assert_eq!(registry.available_for(ContentType::Academic).len(), 1);
        assert!(registry.available_for(ContentType::Shopping).is_empty());
    }

    #[test]
    fn test_simulation_only() {
        let mut settings = Settings::default();
        settings.enable_only("simulation");
        let registry = ProviderLoader::load(&settings).unwrap();
        assert_eq!(registry.ids(), vec!["simulation"]);
        assert_eq!(registry.available_for(ContentType::Shopping).len(), 1);
    }

    #[test]
    fn test_unknown_and_unservable_providers_are_skipped() {
        let mut settings = Settings::default();
        settings.providers = vec![
            ProviderConfig {
                name: "mystery".to_string(),
                provider: "mystery".to_string(),
                ..Default::default()
            },
            ProviderConfig {
                name: "ddg-images".to_string(),
                provider: "duckduckgo".to_string(),
                content_types: vec![ContentType::Images],
                ..Default::default()
            },
            ProviderConfig {
                name: "wiki".to_string(),
                provider: "wikipedia".to_string(),
                timeout: Some(1.5),
                ..Default::default()
            },
        ];

        let registry = ProviderLoader::load(&settings).unwrap();
        assert_eq!(registry.ids(), vec!["wiki"]);
        let slot = &registry.available_for(ContentType::Web)[0];
        assert_eq!(slot.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(ProviderLoader::available_providers().len(), 3);
    }

    #[test]
    fn test_invalid_provider_timeout_is_an_error() {
        let mut settings = Settings::default();
        settings.enable_only("simulation");
        for provider in &mut settings.providers {
            provider.timeout = Some(-1.0);
        }

        let err = ProviderLoader::load(&settings).unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }
}
