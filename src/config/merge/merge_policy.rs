//! Merge rules: built-in defaults sit under every file layer.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the generation and logging defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("generation.locale", "en")?
        .set_default("generation.max_length", 72)?
        .set_default("generation.candidate_count", 3)?
        .set_default("generation.message_style", "plain")?
        .set_default("generation.include_body", false)?
        .set_default("attempt_log.sink", "tracing")?
        .set_default("logging.level", "warn")?
        .set_default("logging.output", "stderr")
}
