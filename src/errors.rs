use thiserror::Error;

pub type Result<T> = std::result::Result<T, PrepmindError>;

#[derive(Error, Debug)]
pub enum PrepmindError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parsing error")]
    Parse,
    #[error("Store error: {0}")]
    Store(String),
    #[error("No document {collection}/{key}")]
    NotFound { collection: String, key: String },
    #[error("Auth error ({0})")]
    Auth(String),
    #[error("No user is signed in")]
    NotSignedIn,
    #[error("Config error: {0}")]
    Config(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for PrepmindError {
    fn from(_: serde_json::Error) -> Self {
        Self::Parse
    }
}

impl From<toml::de::Error> for PrepmindError {
    fn from(value: toml::de::Error) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<toml::ser::Error> for PrepmindError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Config(value.to_string())
    }
}
