use std::path::{Path, PathBuf};
use tauri::{AppHandle, Manager};

use crate::error::AppError;

/// Fixed locations shared with the external study-assistant tool.
#[derive(Debug, Clone)]
pub struct Paths {
    pub home: PathBuf,
    pub tool_root: PathBuf,
    pub notes_dir: PathBuf,
    pub incoming_dir: PathBuf,
    pub env_file: PathBuf,
}

impl Paths {
    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let tool_root = home.join("study_assistant");
        let notes_dir = tool_root.join("notes");
        let incoming_dir = notes_dir.join("incoming");
        let env_file = tool_root.join(".env");

        Self {
            home,
            tool_root,
            notes_dir,
            incoming_dir,
            env_file,
        }
    }

    pub fn resolve(app: &AppHandle) -> Result<Self, AppError> {
        let home = app.path().home_dir()?;
        Ok(Self::from_home(home))
    }
}

// Expand a leading "~" in a user-entered folder path
pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_from_home() {
        let paths = Paths::from_home("/home/ada");
        assert_eq!(paths.tool_root, PathBuf::from("/home/ada/study_assistant"));
        assert_eq!(paths.notes_dir, PathBuf::from("/home/ada/study_assistant/notes"));
        assert_eq!(
            paths.incoming_dir,
            PathBuf::from("/home/ada/study_assistant/notes/incoming")
        );
        assert_eq!(paths.env_file, PathBuf::from("/home/ada/study_assistant/.env"));
    }

    #[test]
    fn test_expand_tilde() {
        let home = Path::new("/home/ada");
        assert_eq!(expand_tilde("~", home), PathBuf::from("/home/ada"));
        assert_eq!(
            expand_tilde("~/Desktop/NotePal", home),
            PathBuf::from("/home/ada/Desktop/NotePal")
        );
        assert_eq!(expand_tilde("/tmp/notes", home), PathBuf::from("/tmp/notes"));
        // Only a leading tilde for the current user is expanded
        assert_eq!(expand_tilde("~bob/notes", home), PathBuf::from("~bob/notes"));
    }
}
