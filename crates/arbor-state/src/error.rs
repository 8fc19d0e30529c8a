use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("topology file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("topology snapshot {path}: {source}")]
    Serialization {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
