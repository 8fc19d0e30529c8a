use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid options file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("discovery returned no candidates for resource '{0}'")]
    NoCandidates(String),

    #[error("own address {0} is unspecified; parents could not reach it")]
    UnspecifiedAddress(arbor_protocol::Address),

    #[error("none of {tried} candidates accepted INIT")]
    Exhausted { tried: usize },
}
