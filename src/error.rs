use thiserror::Error;

/// Failure of a single fetch attempt, on either transport.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("empty markup returned for {url}")]
    EmptyMarkup { url: String },

    #[error("no listing cards found on {url}")]
    NoCards { url: String },

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("both transports failed for {url} (lightweight: {lightweight}; full render: {full_render})")]
    Exhausted {
        url: String,
        lightweight: String,
        full_render: String,
    },
}

/// Failure of an operation on a live, scriptable page.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch render engine: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out waiting for \"{selector}\"")]
    WaitTimeout { selector: String },

    #[error("element interaction failed on \"{selector}\": {reason}")]
    Interaction { selector: String, reason: String },

    #[error("script evaluation failed: {0}")]
    Script(String),
}

#[derive(Debug, Error)]
#[error("invalid selector \"{selector}\": {reason}")]
pub struct CascadeError {
    pub selector: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write records to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error for {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Failure to build an extraction component from its static configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Cascade(#[from] CascadeError),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
