//! Environment sources: `STACKGEN__SECTION__KEY` overrides plus the
//! conventional `OPENAI_API_KEY` / `OPENAI_MODEL` variables.

use crate::config::StackgenConfig;
use crate::provider::ProviderType;
use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const ENV_PREFIX: &str = "STACKGEN";
pub const ENV_SEPARATOR: &str = "__";

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    )
}

/// Apply `OPENAI_API_KEY` when no key is configured, and `OPENAI_MODEL`
/// unless `STACKGEN__PROVIDER__MODEL` already chose one. OpenAI only.
pub fn apply_provider_env<F>(config: &mut StackgenConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if config.provider.provider_type != ProviderType::OpenAI {
        return;
    }
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if config.provider.effective_api_key().is_none() {
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            config.provider.api_key = Some(key);
        }
    }
    if non_empty("STACKGEN__PROVIDER__MODEL").is_none() {
        if let Some(model) = non_empty("OPENAI_MODEL") {
            config.provider.model = model;
        }
    }
}
