use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tauri::{AppHandle, Manager};

use crate::error::AppError;

pub const AVAILABLE_MODELS: [&str; 3] = ["gpt-4o-mini", "gpt-4o", "gpt-4-turbo"];
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_INCOMING_PATH: &str = "~/Desktop/NotePal/process_notes";
pub const DEFAULT_OUTPUT_PATH: &str = "~/Desktop/NotePal/Generated_study_material";

// Operational values the external tool expects; not user-editable
const LOG_LEVEL: &str = "INFO";
const MAX_REQUESTS_PER_MINUTE: u32 = 50;

pub const SAVED_MESSAGE: &str = "Settings saved to .env file. Restart for changes to take effect.";

// App settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub incoming_path: String,
    pub output_path: String,
    pub dark_mode: bool,
    pub auto_process: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            incoming_path: DEFAULT_INCOMING_PATH.to_string(),
            output_path: DEFAULT_OUTPUT_PATH.to_string(),
            dark_mode: false,
            auto_process: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderKind {
    Incoming,
    Output,
}

impl Settings {
    pub fn set_folder(&mut self, kind: FolderKind, path: String) {
        match kind {
            FolderKind::Incoming => self.incoming_path = path,
            FolderKind::Output => self.output_path = path,
        }
    }
}

// Get settings file path
pub fn settings_path(app: &AppHandle) -> Result<PathBuf> {
    let app_data = app.path().app_data_dir()?;
    std::fs::create_dir_all(&app_data)?;
    Ok(app_data.join("settings.json"))
}

// Load settings from disk, falling back to defaults on any problem
pub fn load_settings(app: &AppHandle) -> Settings {
    match settings_path(app) {
        Ok(path) => load_settings_from(&path),
        Err(e) => {
            log::warn!("settings location unavailable, using defaults: {}", e);
            Settings::default()
        }
    }
}

pub fn load_settings_from(path: &Path) -> Settings {
    if !path.exists() {
        return Settings::default();
    }

    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_else(|| {
            log::warn!("ignoring unreadable settings file {}", path.display());
            Settings::default()
        })
}

pub fn save_settings(app: &AppHandle, settings: &Settings) -> Result<()> {
    let path = settings_path(app)?;
    save_settings_to(&path, settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Render the `.env` file read by the study-assistant tool.
///
/// Values go in verbatim. The file is write-only from NotePal's side.
pub fn render_env(settings: &Settings) -> String {
    format!(
        "# OpenAI Configuration\n\
         OPENAI_API_KEY={api_key}\n\
         OPENAI_MODEL={model}\n\
         \n\
         # Folder Configuration\n\
         NOTES_INCOMING_DIR={incoming}\n\
         NOTES_OUTPUT_DIR={output}\n\
         PROCESSED_INDEX_PATH={output}/processed_index.json\n\
         \n\
         # Application Settings\n\
         LOG_LEVEL={log_level}\n\
         MAX_REQUESTS_PER_MINUTE={rate}",
        api_key = settings.api_key,
        model = settings.model,
        incoming = settings.incoming_path,
        output = settings.output_path,
        log_level = LOG_LEVEL,
        rate = MAX_REQUESTS_PER_MINUTE,
    )
}

/// Write the env file through a sibling temp file and a rename.
pub fn write_env_file(path: &Path, settings: &Settings) -> Result<(), AppError> {
    let parent = path
        .parent()
        .ok_or_else(|| AppError::Settings(format!("no parent directory for {}", path.display())))?;
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(".env");
    let tmp = parent.join(format!("{}.tmp", file_name));

    std::fs::write(&tmp, render_env(settings))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
