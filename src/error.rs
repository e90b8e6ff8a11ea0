use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation failed on resource '{resource}'\n{message}")]
    InvalidResource { resource: String, message: String },

    #[error("Invalid resource name {0:?}\n{1}")]
    InvalidResourceName(String, String),

    #[error("Invalid stack name {0}\nMust only consist of alphanumeric characters and hyphens, Must start with an alphabetical character, and cannot be longer than 128 characters.")]
    InvalidStackName(String),

    #[error("Duplicate logical id '{0}' in stack")]
    DuplicateLogicalId(String),

    #[error("Invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error("Invalid build spec: {0}")]
    InvalidBuildSpec(String),

    #[error("Failed to package asset {path}\n{message}")]
    Asset { path: String, message: String },

    #[error("Failed to load config {path}\n{message}")]
    Config { path: String, message: String },

    #[error("Stack {stack} failed: {reason}")]
    StackFailed { stack: String, reason: String },

    #[error("AWS request failed\n{0}")]
    Aws(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to serialize build spec: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub(crate) fn aws<E: std::fmt::Debug>(e: E) -> Self {
        Error::Aws(format!("{:#?}", e))
    }
}
