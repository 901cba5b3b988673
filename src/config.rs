//! Engine configuration (component of the ambient stack, §6.4 / §10.3):
//! `clap`-derived CLI flags layered over environment variables, with CLI
//! flags taking precedence. Each provider ships a built-in default model
//! list so a bare credential environment variable is enough to run.

use crate::llm::ProviderKind;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::env;

fn default_models(provider: ProviderKind) -> Vec<String> {
    match provider {
        ProviderKind::OpenAi => vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()],
        ProviderKind::Anthropic => vec![
            "claude-sonnet-4-5-20250929".to_string(),
            "claude-opus-4-1-20250805".to_string(),
        ],
        ProviderKind::Gemini => vec!["gemini-2.0-flash".to_string(), "gemini-1.5-pro".to_string()],
        ProviderKind::Perplexity => vec!["sonar".to_string(), "sonar-pro".to_string()],
    }
}

fn env_key_for(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::OpenAi => "OPENAI_API_KEY",
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        ProviderKind::Gemini => "GEMINI_API_KEY",
        ProviderKind::Perplexity => "PERPLEXITY_API_KEY",
    }
}

/// Per-provider credential plus model allowlist, resolved from environment
/// variables unless overridden on the CLI.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub models: Vec<String>,
}

/// The engine-wide defaults that govern the iteration loop and the tool-side
/// safety gates surfaced to NiFi tools via HTTP headers.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub providers: HashMap<ProviderKind, ProviderConfig>,
    pub max_iterations_default: u32,
    pub token_budget_default: u32,
    pub auto_prune_default: bool,
    pub auto_stop_enabled: bool,
    pub auto_delete_enabled: bool,
    pub auto_purge_enabled: bool,
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl EngineConfig {
    /// Build configuration from environment variables alone, then apply any
    /// CLI overrides present on `cli`.
    pub fn load(cli: &Cli) -> Self {
        let mut providers = HashMap::new();
        for provider in [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Gemini,
            ProviderKind::Perplexity,
        ] {
            let api_key = env::var(env_key_for(provider)).ok();
            providers.insert(
                provider,
                ProviderConfig {
                    api_key,
                    models: default_models(provider),
                },
            );
        }

        let mut config = Self {
            providers,
            max_iterations_default: env_u32("NIFI_ENGINE_MAX_ITERATIONS", 25),
            token_budget_default: env_u32("NIFI_ENGINE_TOKEN_BUDGET", 100_000),
            auto_prune_default: env_flag("NIFI_ENGINE_AUTO_PRUNE", true),
            auto_stop_enabled: env_flag("NIFI_ENGINE_AUTO_STOP", true),
            auto_delete_enabled: env_flag("NIFI_ENGINE_AUTO_DELETE", false),
            auto_purge_enabled: env_flag("NIFI_ENGINE_AUTO_PURGE", false),
        };

        if let Commands::Run(run) = &cli.command {
            if let Some(max_iterations) = run.max_iterations {
                config.max_iterations_default = max_iterations;
            }
            if let Some(token_budget) = run.token_budget {
                config.token_budget_default = token_budget;
            }
            if let Some(api_key) = &run.api_key {
                if let Some(entry) = config.providers.get_mut(&run.provider) {
                    entry.api_key = Some(api_key.clone());
                }
            }
        }

        config
    }

    /// Headers a tool executor attaches to every outgoing NiFi tool call,
    /// surfacing the safety gates as the wire protocol expects them.
    pub fn safety_headers(&self) -> HashMap<&'static str, &'static str> {
        let mut headers = HashMap::new();
        headers.insert(
            "X-Mcp-Auto-Stop-Enabled",
            if self.auto_stop_enabled { "true" } else { "false" },
        );
        headers.insert(
            "X-Mcp-Auto-Delete-Enabled",
            if self.auto_delete_enabled { "true" } else { "false" },
        );
        headers.insert(
            "X-Mcp-Auto-Purge-Enabled",
            if self.auto_purge_enabled { "true" } else { "false" },
        );
        headers
    }
}

#[derive(Parser, Debug)]
#[command(name = "nifi-agent-runtime")]
#[command(author, version, about = "Multi-provider LLM agent runtime for Apache NiFi", long_about = None)]
pub struct Cli {
    /// Enable verbose logging (shorthand for RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single agent turn against a configured provider
    Run(RunArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Provider to dispatch to: openai, anthropic, gemini, perplexity
    #[arg(long, value_parser = parse_provider_kind)]
    pub provider: ProviderKind,

    /// Model identifier (must be in the provider's configured model list)
    #[arg(long)]
    pub model: String,

    /// System prompt for the turn
    #[arg(long, default_value = "")]
    pub system: String,

    /// User message that starts the turn
    #[arg(long)]
    pub message: String,

    /// Override the API key environment variable for this run
    #[arg(long)]
    pub api_key: Option<String>,

    /// Override the configured max-iterations default
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Override the configured token-budget default
    #[arg(long)]
    pub token_budget: Option<u32>,
}

fn parse_provider_kind(s: &str) -> Result<ProviderKind, String> {
    ProviderKind::parse(s).ok_or_else(|| format!("unknown provider '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_override_wins_over_environment_default() {
        let cli = Cli {
            verbose: false,
            command: Commands::Run(RunArgs {
                provider: ProviderKind::OpenAi,
                model: "gpt-4o".to_string(),
                system: String::new(),
                message: "hi".to_string(),
                api_key: Some("sk-override".to_string()),
                max_iterations: Some(7),
                token_budget: Some(2_000),
            }),
        };
        let config = EngineConfig::load(&cli);
        assert_eq!(config.max_iterations_default, 7);
        assert_eq!(config.token_budget_default, 2_000);
        assert_eq!(
            config.providers.get(&ProviderKind::OpenAi).unwrap().api_key,
            Some("sk-override".to_string())
        );
    }

    #[test]
    fn every_provider_has_a_nonempty_default_model_list() {
        for provider in [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Gemini,
            ProviderKind::Perplexity,
        ] {
            assert!(!default_models(provider).is_empty());
        }
    }

    #[test]
    fn safety_headers_default_to_stop_enabled_delete_and_purge_disabled() {
        let cli = Cli {
            verbose: false,
            command: Commands::Run(RunArgs {
                provider: ProviderKind::OpenAi,
                model: "gpt-4o".to_string(),
                system: String::new(),
                message: "hi".to_string(),
                api_key: None,
                max_iterations: None,
                token_budget: None,
            }),
        };
        let config = EngineConfig::load(&cli);
        let headers = config.safety_headers();
        assert_eq!(headers.get("X-Mcp-Auto-Delete-Enabled"), Some(&"false"));
        assert_eq!(headers.get("X-Mcp-Auto-Purge-Enabled"), Some(&"false"));
    }
}
