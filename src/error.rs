use serde::{Serialize, Serializer};

/// Everything a NotePal command can fail with.
///
/// Commands hand this straight back to the webview, where it arrives as its
/// display string.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Could not read file")]
    UnreadableDrop,
    #[error("Unsupported file type: .{0}")]
    UnsupportedFileType(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Spawn(#[source] std::io::Error),
    #[error("Notes are already being processed")]
    AlreadyRunning,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Could not open {0}")]
    Open(String),
    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),
    #[error("Settings error: {0}")]
    Settings(String),
    #[error(transparent)]
    Tauri(#[from] tauri::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Settings(format!("{:#}", err))
    }
}

impl Serialize for AppError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
