#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {key}: `{value}` ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("settings validation failed: {0}")]
    Settings(String),
    #[error("missing credentials: set `api_key` in the config file or BULKDIGEST_API_KEY")]
    MissingCredentials,
    #[error("no catalog configured: pass --catalog <path> or set BULKDIGEST_CATALOG")]
    MissingCatalog,
    #[error("failed to resolve home directory for default state path")]
    HomeDirectoryUnavailable,
}
