use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `SEGMENT_EXPRESS__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Limits applied while parsing rule text.
#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    /// Maximum expression nesting depth accepted by the parser.
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,
}

/// Parsed-rule cache sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

// Default functions
fn default_max_nesting_depth() -> usize {
    64
}
fn default_cache_ttl_secs() -> u64 {
    3600
}
fn default_cache_max_entries() -> usize {
    10_000
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: default_max_nesting_depth(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules: RulesConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("SEGMENT_EXPRESS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
