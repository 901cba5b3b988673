//! Dispatcher: validate a `(provider, model)` request against
//! configured credentials and model lists before making any network call,
//! then hand off to the matching [`crate::llm::adapters::ProviderAdapter`].
//!
//! Grounded in the request-validation gate ahead of the original dispatcher:
//! provider must be one of the four known backends, model must be in that
//! provider's configured model list, and an API key must be present —
//! checked in that order, each failure surfaced as a distinct
//! [`ProviderError`] before any HTTP request is attempted.

use crate::llm::adapters::{build_adapter, ProviderAdapter};
use crate::llm::provider::{DispatchResponse, Message, ProviderError, ProviderKind, Tool};
use std::collections::HashMap;

/// Per-provider credential and model-allowlist configuration.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url_override: Option<String>,
    pub allowed_models: Vec<String>,
}

/// Holds one [`ProviderAdapter`] per configured backend, keyed by
/// [`ProviderKind`]; `dispatch` is the single entry point the loop calls
/// each iteration.
pub struct Dispatcher {
    adapters: HashMap<ProviderKind, Box<dyn ProviderAdapter>>,
    settings: HashMap<ProviderKind, ProviderSettings>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            settings: HashMap::new(),
        }
    }

    /// Register a provider's credentials and model allowlist, building its
    /// adapter immediately so a later `dispatch` never has to.
    pub fn configure(&mut self, kind: ProviderKind, settings: ProviderSettings) {
        if let Some(api_key) = settings.api_key.clone() {
            let adapter = build_adapter(kind, api_key, settings.base_url_override.clone());
            self.adapters.insert(kind, adapter);
        }
        self.settings.insert(kind, settings);
    }

    /// Register an already-built adapter directly, bypassing credential
    /// construction — used by tests to substitute a scripted adapter for a
    /// real HTTP client.
    pub fn configure_with_adapter(
        &mut self,
        kind: ProviderKind,
        settings: ProviderSettings,
        adapter: Box<dyn ProviderAdapter>,
    ) {
        self.adapters.insert(kind, adapter);
        self.settings.insert(kind, settings);
    }

    /// Validate and execute one dispatch. Order of checks: provider known,
    /// model allowed, credentials present — each returns before any network
    /// call is made.
    pub async fn dispatch(
        &self,
        provider: ProviderKind,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<DispatchResponse, ProviderError> {
        let settings = self.settings.get(&provider).ok_or_else(|| {
            ProviderError::ConfigError(format!("provider '{}' is not configured", provider))
        })?;

        if !settings.allowed_models.is_empty() && !settings.allowed_models.iter().any(|m| m == model) {
            return Err(ProviderError::ModelNotFound(model.to_string()));
        }

        let adapter = self.adapters.get(&provider).ok_or_else(|| {
            ProviderError::ConfigError(format!("no API key configured for provider '{}'", provider))
        })?;

        adapter.dispatch(model, system_prompt, messages, tools).await
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Free-function convenience wrapper for a one-off dispatch against an
/// already-built adapter, used by callers (tests, the loop engine) that
/// construct a single adapter directly rather than through [`Dispatcher`].
pub async fn dispatch(
    adapter: &dyn ProviderAdapter,
    model: &str,
    system_prompt: Option<&str>,
    messages: &[Message],
    tools: &[Tool],
) -> Result<DispatchResponse, ProviderError> {
    adapter.dispatch(model, system_prompt, messages, tools).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_provider_fails_before_network() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .dispatch(ProviderKind::OpenAi, "gpt-4o", None, &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ConfigError(_)));
    }

    #[tokio::test]
    async fn model_outside_allowlist_is_rejected() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.configure(
            ProviderKind::OpenAi,
            ProviderSettings {
                api_key: Some("sk-test".to_string()),
                base_url_override: None,
                allowed_models: vec!["gpt-4o".to_string()],
            },
        );
        let err = dispatcher
            .dispatch(ProviderKind::OpenAi, "gpt-3.5-turbo", None, &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ModelNotFound(_)));
    }

    #[tokio::test]
    async fn missing_credentials_without_allowlist_entry_is_config_error() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.configure(
            ProviderKind::Anthropic,
            ProviderSettings {
                api_key: None,
                base_url_override: None,
                allowed_models: vec![],
            },
        );
        let err = dispatcher
            .dispatch(ProviderKind::Anthropic, "claude-sonnet-4-5-20250929", None, &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ConfigError(_)));
    }
}
