use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tauri::AppHandle;

use crate::error::AppError;
use crate::intake::is_supported;

pub const INCOMING_CHANGE_EVENT: &str = "incoming-change";

const DEBOUNCE: Duration = Duration::from_millis(500);

// Incoming watcher state
pub struct IncomingWatcher {
    #[allow(dead_code)]
    watcher: RecommendedWatcher,
}

// Incoming folder event payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomingChange {
    pub kind: String,
    pub path: String,
}

// Keyed by path and event kind so a delete never hides the create that follows
type DebounceKey = (PathBuf, &'static str);

pub type DebounceMap = Arc<Mutex<HashMap<DebounceKey, Instant>>>;

// Drop debounce entries older than 5 seconds
pub fn cleanup_debounce_map(map: &Mutex<HashMap<DebounceKey, Instant>>) {
    let mut map = map.lock().expect("debounce map mutex");
    let now = Instant::now();
    map.retain(|_, last| now.duration_since(*last) < Duration::from_secs(5));
}

// True when this path fired the same kind of event recently enough to be ignored
fn debounced(
    map: &Mutex<HashMap<DebounceKey, Instant>>,
    path: &Path,
    kind: &'static str,
    now: Instant,
) -> bool {
    let mut map = map.lock().expect("debounce map mutex");

    if map.len() > 100 {
        map.retain(|_, last| now.duration_since(*last) < Duration::from_secs(5));
    }

    let key = (path.to_path_buf(), kind);
    if let Some(last) = map.get(&key) {
        if now.duration_since(*last) < DEBOUNCE {
            return true;
        }
    }
    map.insert(key, now);
    false
}

fn classify(kind: &notify::EventKind) -> Option<&'static str> {
    match kind {
        notify::EventKind::Create(_) => Some("created"),
        notify::EventKind::Modify(_) => Some("modified"),
        notify::EventKind::Remove(_) => Some("deleted"),
        _ => None,
    }
}

/// Watch the incoming folder and report supported files as they come and go.
///
/// `on_created` runs on the watcher thread for every new supported file.
pub fn watch_incoming<F>(
    app_handle: AppHandle,
    incoming_dir: &Path,
    debounce_map: DebounceMap,
    on_created: F,
) -> Result<IncomingWatcher, AppError>
where
    F: Fn(&AppHandle, &Path) + Send + 'static,
{
    std::fs::create_dir_all(incoming_dir)?;

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("incoming watcher error: {}", e);
                    return;
                }
            };
            let Some(kind) = classify(&event.kind) else {
                return;
            };

            for path in event.paths.iter().filter(|p| is_supported(p)) {
                if debounced(&debounce_map, path, kind, Instant::now()) {
                    continue;
                }

                crate::emit_or_warn(
                    &app_handle,
                    INCOMING_CHANGE_EVENT,
                    IncomingChange {
                        kind: kind.to_string(),
                        path: path.to_string_lossy().into_owned(),
                    },
                );

                if kind == "created" {
                    on_created(&app_handle, path);
                }
            }
        },
        Config::default(),
    )
    .map_err(|e| AppError::Settings(format!("cannot watch incoming folder: {}", e)))?;

    watcher
        .watch(incoming_dir, RecursiveMode::NonRecursive)
        .map_err(|e| AppError::Settings(format!("cannot watch incoming folder: {}", e)))?;

    log::info!("watching {}", incoming_dir.display());
    Ok(IncomingWatcher { watcher })
}

/// Supported files currently waiting in the incoming folder, by name.
pub fn list_incoming(incoming_dir: &Path) -> Result<Vec<String>, AppError> {
    if !incoming_dir.exists() {
        return Ok(vec![]);
    }

    let mut names: Vec<String> = std::fs::read_dir(incoming_dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported(path))
        .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_incoming_filters_and_sorts() {
        let dir = std::env::temp_dir().join(format!("notepal-test-incoming-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("nested.md")).unwrap();
        for name in ["zoology.txt", "algebra.md", ".DS_Store", "scan.png", "Essay.DOCX"] {
            std::fs::write(dir.join(name), "x").unwrap();
        }

        let names = list_incoming(&dir).unwrap();
        assert_eq!(names, vec!["Essay.DOCX", "algebra.md", "zoology.txt"]);

        let _ = std::fs::remove_dir_all(&dir);
        assert!(list_incoming(&dir).unwrap().is_empty());
    }

    #[test]
    fn test_debounce_window() {
        let map = Mutex::new(HashMap::new());
        let path = Path::new("/incoming/a.md");
        let start = Instant::now();

        assert!(!debounced(&map, path, "modified", start));
        assert!(debounced(&map, path, "modified", start + Duration::from_millis(100)));
        assert!(!debounced(&map, path, "modified", start + Duration::from_millis(700)));
        assert!(!debounced(&map, Path::new("/incoming/b.md"), "modified", start));
    }

    #[test]
    fn test_replacing_a_file_still_reports_the_create() {
        // Dropping a file that already exists removes the old copy first
        let map = Mutex::new(HashMap::new());
        let path = Path::new("/incoming/a.md");
        let start = Instant::now();

        assert!(!debounced(&map, path, "deleted", start));
        assert!(!debounced(&map, path, "created", start + Duration::from_millis(10)));
        assert!(debounced(&map, path, "created", start + Duration::from_millis(20)));
    }

    #[test]
    fn test_cleanup_debounce_map_drops_stale_entries() {
        let map = Mutex::new(HashMap::new());
        let stale = Instant::now() - Duration::from_secs(10);
        map.lock()
            .unwrap()
            .insert((PathBuf::from("/incoming/old.md"), "created"), stale);
        assert!(!debounced(&map, Path::new("/incoming/new.md"), "created", Instant::now()));

        cleanup_debounce_map(&map);
        let map = map.lock().unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&(PathBuf::from("/incoming/new.md"), "created")));
    }

    #[test]
    fn test_classify_event_kinds() {
        use notify::event::{CreateKind, RemoveKind};
        assert_eq!(classify(&notify::EventKind::Create(CreateKind::File)), Some("created"));
        assert_eq!(classify(&notify::EventKind::Remove(RemoveKind::File)), Some("deleted"));
        assert_eq!(classify(&notify::EventKind::Any), None);
    }
}
