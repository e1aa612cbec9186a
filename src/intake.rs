use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::AppError;
use crate::toast::Toast;

/// Note formats the study-assistant tool knows how to read.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["txt", "md", "markdown", "pdf", "docx", "doc"];

// A file copied into the incoming folder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedFile {
    pub name: String,
    pub destination: String,
}

// Per-path result returned to the webview
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropOutcome {
    pub source: String,
    pub added: Option<DroppedFile>,
    pub error: Option<String>,
}

/// Lowercased last extension, or an empty string when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default()
}

pub fn is_supported(path: &Path) -> bool {
    let ext = extension_of(path);
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Copy `source` into `incoming_dir`, replacing a file of the same name.
///
/// The copy is not atomic: a crash part-way through leaves a partial file at
/// the destination.
pub async fn copy_into_incoming(source: &Path, incoming_dir: &Path) -> Result<DroppedFile, AppError> {
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(AppError::UnreadableDrop)?
        .to_string();

    if !is_supported(source) {
        return Err(AppError::UnsupportedFileType(extension_of(source)));
    }

    fs::create_dir_all(incoming_dir).await?;

    let destination: PathBuf = incoming_dir.join(&name);
    if fs::try_exists(&destination).await? {
        fs::remove_file(&destination).await?;
    }
    fs::copy(source, &destination).await?;

    Ok(DroppedFile {
        name,
        destination: destination.to_string_lossy().into_owned(),
    })
}

/// Console text and toast that report a drop to the user.
pub fn describe_drop(result: &Result<DroppedFile, AppError>) -> (String, Toast) {
    match result {
        Ok(file) => (
            format!("Added: {}\n\nReady to process!", file.name),
            Toast::success(format!("File added: {}", file.name)),
        ),
        Err(AppError::UnsupportedFileType(ext)) => (
            format!(
                "Unsupported file type: .{}\n\nSupported: .txt, .md, .pdf, .docx",
                ext
            ),
            Toast::error(format!("Unsupported file type: .{}", ext)),
        ),
        Err(AppError::UnreadableDrop) => (
            "Could not read file".to_string(),
            Toast::error("Failed to read file"),
        ),
        Err(e) => (format!("Error: {}", e), Toast::error("Error adding file")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toast::ToastKind;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "notepal-test-intake-{}-{}",
            label,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_supported_extensions_case_insensitive() {
        assert!(is_supported(Path::new("/tmp/lecture.MD")));
        assert!(is_supported(Path::new("chapter.Markdown")));
        assert!(is_supported(Path::new("slides.pdf")));
        assert!(is_supported(Path::new("essay.doc")));
        assert!(!is_supported(Path::new("photo.png")));
        assert!(!is_supported(Path::new("README")));
        // Only the last extension counts
        assert!(!is_supported(Path::new("notes.md.zip")));
    }

    #[tokio::test]
    async fn test_copy_creates_incoming_and_overwrites() {
        let dir = scratch_dir("copy");
        let source = dir.join("biology.md");
        std::fs::write(&source, "# Cells\n").unwrap();
        let incoming = dir.join("study_assistant").join("notes").join("incoming");

        let added = copy_into_incoming(&source, &incoming).await.unwrap();
        assert_eq!(added.name, "biology.md");
        assert_eq!(std::fs::read_to_string(incoming.join("biology.md")).unwrap(), "# Cells\n");

        std::fs::write(&source, "# Mitochondria\n").unwrap();
        copy_into_incoming(&source, &incoming).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(incoming.join("biology.md")).unwrap(),
            "# Mitochondria\n"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_copy_rejects_unsupported_type() {
        let dir = scratch_dir("reject");
        let source = dir.join("diagram.png");
        std::fs::write(&source, [0u8; 4]).unwrap();
        let incoming = dir.join("incoming");

        let err = copy_into_incoming(&source, &incoming).await.unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFileType(ref ext) if ext == "png"));
        assert!(!incoming.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_copy_missing_source_is_io_error() {
        let dir = scratch_dir("missing");
        let err = copy_into_incoming(&dir.join("gone.txt"), &dir.join("incoming"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_copy_rejects_path_without_name() {
        let err = copy_into_incoming(Path::new("/"), Path::new("/tmp/never-used"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnreadableDrop));
    }

    #[test]
    fn test_describe_drop_messages() {
        let ok = Ok(DroppedFile {
            name: "history.txt".to_string(),
            destination: "/x/history.txt".to_string(),
        });
        let (console, toast) = describe_drop(&ok);
        assert_eq!(console, "Added: history.txt\n\nReady to process!");
        assert_eq!(toast.message, "File added: history.txt");
        assert_eq!(toast.kind, ToastKind::Success);

        let (console, toast) = describe_drop(&Err(AppError::UnsupportedFileType("".to_string())));
        assert_eq!(console, "Unsupported file type: .\n\nSupported: .txt, .md, .pdf, .docx");
        assert_eq!(toast.message, "Unsupported file type: .");

        let (console, toast) = describe_drop(&Err(AppError::UnreadableDrop));
        assert_eq!(console, "Could not read file");
        assert_eq!(toast.message, "Failed to read file");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let (console, toast) = describe_drop(&Err(AppError::Io(io)));
        assert_eq!(console, "Error: permission denied");
        assert_eq!(toast.message, "Error adding file");
        assert_eq!(toast.kind, ToastKind::Error);
    }
}
