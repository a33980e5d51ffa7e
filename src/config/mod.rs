mod embed_config;

pub use embed_config::{CONFIG_FILE_NAME, ConfigError, EmbedConfig};
