use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoofDeskError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("No backend URL configured. Run `roofdesk config --set-url https://...` or set ROOFDESK_URL")]
    MissingBackend,

    #[error("Record not found: {table}/{id}")]
    NotFound { table: String, id: String },

    #[error("No client matches '{0}'")]
    ClientNotFound(String),

    #[error("'{query}' matches {count} clients; be more specific")]
    AmbiguousClient { query: String, count: usize },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("No media found in: {0}")]
    NoMediaFound(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF generation failed: {0}")]
    PdfGeneration(String),

    #[error("Excel generation failed: {0}")]
    ExcelGeneration(String),

    #[error("Spreadsheet import failed: {0}")]
    Import(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error(transparent)]
    Common(#[from] roofdesk_common::Error),
}

impl RoofDeskError {
    /// The backend could not be reached or failed server-side.
    /// Only these errors are worth retrying against the local mirror.
    pub fn is_unavailable(&self) -> bool {
        match self {
            RoofDeskError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            RoofDeskError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RoofDeskError>;
