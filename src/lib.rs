pub mod error;
pub mod history;
pub mod intake;
pub mod paths;
pub mod runner;
pub mod session;
pub mod settings;
pub mod toast;
pub mod watcher;

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tauri::{AppHandle, DragDropEvent, Emitter, Manager, State, WindowEvent};
use tauri_plugin_clipboard_manager::ClipboardExt;
use tauri_plugin_dialog::DialogExt;
use tauri_plugin_opener::OpenerExt;
use uuid::Uuid;

use error::AppError;
use history::{History, HistoryRow};
use intake::DropOutcome;
use paths::Paths;
use runner::{AutoStart, RunGuard, ToolCommand};
use session::{ConsoleUpdate, Session};
use settings::{FolderKind, Settings};
use toast::Toast;
use watcher::{DebounceMap, IncomingWatcher};

pub const CONSOLE_EVENT: &str = "console";
pub const PROCESSING_EVENT: &str = "processing-state";
pub const PROCESS_FINISHED_EVENT: &str = "process-finished";
pub const DRAG_EVENT: &str = "drag-over";

// Give a freshly created file time to finish copying before the tool reads it
const AUTO_PROCESS_DELAY: Duration = Duration::from_secs(1);

// Everything the commands share
pub struct AppState {
    pub paths: Paths,
    pub settings: RwLock<Settings>,
    pub session: RwLock<Session>,
    pub history: RwLock<History>,
    pub running: Arc<AtomicBool>,
    pub incoming_watcher: Mutex<Option<IncomingWatcher>>,
    pub debounce_map: DebounceMap,
}

impl AppState {
    pub fn new(paths: Paths, settings: Settings) -> Self {
        Self {
            paths,
            settings: RwLock::new(settings),
            session: RwLock::new(Session::default()),
            history: RwLock::new(History::default()),
            running: Arc::new(AtomicBool::new(false)),
            incoming_watcher: Mutex::new(None),
            debounce_map: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[derive(Clone, Serialize)]
struct ProcessingState {
    processing: bool,
}

// A closed webview is not worth failing a command over
pub(crate) fn emit_or_warn<S: Serialize + Clone>(app: &AppHandle, event: &str, payload: S) {
    if let Err(e) = app.emit(event, payload) {
        log::warn!("failed to emit {}: {}", event, e);
    }
}

fn update_console(app: &AppHandle, state: &AppState, update: ConsoleUpdate) {
    update.apply(&mut state.session.write().expect("session write lock"));
    emit_or_warn(app, CONSOLE_EVENT, &update);
}

fn set_processing(app: &AppHandle, state: &AppState, processing: bool) {
    state.session.write().expect("session write lock").processing = processing;
    emit_or_warn(app, PROCESSING_EVENT, ProcessingState { processing });
}

// FILE INTAKE

async fn intake_paths(app: &AppHandle, sources: Vec<PathBuf>) -> Vec<DropOutcome> {
    let state = app.state::<AppState>();
    let mut outcomes = Vec::with_capacity(sources.len());

    for source in sources {
        let result = intake::copy_into_incoming(&source, &state.paths.incoming_dir).await;
        match &result {
            Ok(file) => log::info!("added {} to {}", file.name, state.paths.incoming_dir.display()),
            Err(e) => log::warn!("could not add {}: {}", source.display(), e),
        }

        let (console, toast) = intake::describe_drop(&result);
        update_console(app, &state, ConsoleUpdate::Replace(console));
        toast::notify(app, toast);

        let (added, error) = match result {
            Ok(file) => (Some(file), None),
            Err(e) => (None, Some(e.to_string())),
        };
        outcomes.push(DropOutcome {
            source: source.to_string_lossy().into_owned(),
            added,
            error,
        });
    }

    outcomes
}

#[tauri::command]
async fn add_dropped_files(app: AppHandle, paths: Vec<String>) -> Result<Vec<DropOutcome>, AppError> {
    let sources = paths.into_iter().map(PathBuf::from).collect();
    Ok(intake_paths(&app, sources).await)
}

fn handle_drag_drop(app: &AppHandle, event: &DragDropEvent) {
    match event {
        DragDropEvent::Enter { .. } | DragDropEvent::Over { .. } => {
            emit_or_warn(app, DRAG_EVENT, true);
        }
        DragDropEvent::Leave => {
            emit_or_warn(app, DRAG_EVENT, false);
        }
        DragDropEvent::Drop { paths, .. } => {
            emit_or_warn(app, DRAG_EVENT, false);
            let app = app.clone();
            let paths = paths.clone();
            tauri::async_runtime::spawn(async move {
                intake_paths(&app, paths).await;
            });
        }
        _ => {}
    }
}

// TOOL RUNS

/// Kick off a run of the external tool in the background.
///
/// Fails with `AlreadyRunning` while another run is in flight.
pub fn start_run(app: &AppHandle) -> Result<(), AppError> {
    let guard = RunGuard::try_acquire(Arc::clone(&app.state::<AppState>().running))?;
    launch_run(app, guard);
    Ok(())
}

fn launch_run(app: &AppHandle, guard: RunGuard) {
    let state = app.state::<AppState>();
    let command = ToolCommand::for_tool_dir(&state.paths.tool_root);

    update_console(
        app,
        &state,
        ConsoleUpdate::Replace(runner::STARTED_MESSAGE.to_string()),
    );
    set_processing(app, &state, true);
    log::info!("running: {}", command.line());

    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        execute_run(&app, command, guard).await;
    });
}

async fn execute_run(app: &AppHandle, command: ToolCommand, guard: RunGuard) {
    let state = app.state::<AppState>();

    let result = runner::run_tool(&command, |chunk| {
        update_console(app, &state, ConsoleUpdate::Append(chunk.to_string()));
    })
    .await;

    match &result {
        Ok(output) => log::info!(
            "tool finished with {:?} after {:.1}s",
            output.outcome(),
            output.duration.as_secs_f64()
        ),
        Err(e) => log::error!("tool did not start: {}", e),
    }

    let completion = runner::complete(&result);
    update_console(app, &state, ConsoleUpdate::Append(completion.console_suffix));

    if let Some(entry) = &completion.entry {
        if entry.success {
            state.session.write().expect("session write lock").record_success();
        }
        state
            .history
            .write()
            .expect("history write lock")
            .record(entry.clone());
    }
    toast::notify(app, completion.toast);
    emit_or_warn(app, PROCESS_FINISHED_EVENT, &completion.entry);

    // The UI must see the run end before another one can start
    guard.release_after(|| set_processing(app, &state, false));
}

#[tauri::command]
fn process_notes(app: AppHandle) -> Result<(), AppError> {
    start_run(&app)
}

// SESSION

#[tauri::command]
fn get_session(state: State<AppState>) -> Session {
    state.session.read().expect("session read lock").clone()
}

#[tauri::command]
fn clear_console(app: AppHandle, state: State<AppState>) {
    let update = state.session.write().expect("session write lock").clear_console();
    emit_or_warn(&app, CONSOLE_EVENT, &update);
    toast::notify(&app, Toast::info(session::CLEARED));
}

#[tauri::command]
fn copy_console(app: AppHandle, state: State<AppState>) -> Result<(), AppError> {
    let text = state.session.read().expect("session read lock").console.clone();
    app.clipboard()
        .write_text(text)
        .map_err(|e| AppError::Clipboard(e.to_string()))
}

fn open_with_system(app: &AppHandle, path: &Path) -> Result<(), AppError> {
    let path = path.to_string_lossy().into_owned();
    app.opener()
        .open_path(path.clone(), None::<&str>)
        .map_err(|e| AppError::Open(format!("{}: {}", path, e)))
}

#[tauri::command]
fn open_notes_folder(app: AppHandle, state: State<AppState>) -> Result<(), AppError> {
    std::fs::create_dir_all(&state.paths.notes_dir)?;
    open_with_system(&app, &state.paths.notes_dir)?;
    toast::notify(&app, Toast::info("Opened notes folder"));
    Ok(())
}

// HISTORY

#[tauri::command]
fn get_history(state: State<AppState>) -> Vec<HistoryRow> {
    state
        .history
        .read()
        .expect("history read lock")
        .rows(chrono::Utc::now())
}

#[tauri::command]
fn clear_history(state: State<AppState>) {
    state.history.write().expect("history write lock").clear();
}

#[tauri::command]
fn remove_history_entry(id: Uuid, state: State<AppState>) -> bool {
    state.history.write().expect("history write lock").remove(id)
}

#[tauri::command]
fn open_output(app: AppHandle, path: String, state: State<AppState>) -> Result<(), AppError> {
    let path_buf = paths::expand_tilde(&path, &state.paths.home);
    if !path_buf.exists() {
        return Err(AppError::NotFound(path));
    }
    open_with_system(&app, &path_buf)
}

// SETTINGS

fn store_settings(app: &AppHandle, state: &AppState, new_settings: Settings) -> Result<Settings, AppError> {
    {
        let mut settings = state.settings.write().expect("settings write lock");
        *settings = new_settings;
    }

    let settings = state.settings.read().expect("settings read lock");
    settings::save_settings(app, &settings)?;
    Ok(settings.clone())
}

#[tauri::command]
fn get_settings(state: State<AppState>) -> Settings {
    state.settings.read().expect("settings read lock").clone()
}

#[tauri::command]
fn update_settings(
    app: AppHandle,
    new_settings: Settings,
    state: State<AppState>,
) -> Result<(), AppError> {
    store_settings(&app, &state, new_settings)?;
    Ok(())
}

#[tauri::command]
fn save_settings(
    app: AppHandle,
    new_settings: Settings,
    state: State<AppState>,
) -> Result<String, AppError> {
    let saved = store_settings(&app, &state, new_settings)?;
    settings::write_env_file(&state.paths.env_file, &saved)?;
    log::info!("wrote {}", state.paths.env_file.display());
    Ok(settings::SAVED_MESSAGE.to_string())
}

#[tauri::command]
fn reset_settings(app: AppHandle, state: State<AppState>) -> Result<Settings, AppError> {
    store_settings(&app, &state, Settings::default())
}

#[tauri::command]
fn set_dark_mode(app: AppHandle, enabled: bool, state: State<AppState>) -> Result<(), AppError> {
    let mut settings = state.settings.read().expect("settings read lock").clone();
    settings.dark_mode = enabled;
    store_settings(&app, &state, settings)?;
    Ok(())
}

#[tauri::command]
fn available_models() -> Vec<String> {
    settings::AVAILABLE_MODELS.iter().map(|m| m.to_string()).collect()
}

#[tauri::command]
async fn pick_folder(
    app: AppHandle,
    kind: FolderKind,
    state: State<'_, AppState>,
) -> Result<Option<String>, AppError> {
    let picked = app.dialog().file().blocking_pick_folder();
    let Some(folder) = picked.map(|p| p.to_string()) else {
        return Ok(None);
    };

    let mut settings = state.settings.read().expect("settings read lock").clone();
    settings.set_folder(kind, folder.clone());
    store_settings(&app, &state, settings)?;
    Ok(Some(folder))
}

// INCOMING FOLDER

fn auto_process_new_file(app: &AppHandle, path: &Path) {
    if !app.state::<AppState>().settings.read().expect("settings read lock").auto_process {
        return;
    }

    let name = path.display().to_string();
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        tokio::time::sleep(AUTO_PROCESS_DELAY).await;
        let state = app.state::<AppState>();
        let enabled = state.settings.read().expect("settings read lock").auto_process;
        match runner::auto_start(enabled, &state.running) {
            AutoStart::Start(guard) => {
                log::info!("auto-processing after {} arrived", name);
                launch_run(&app, guard);
            }
            AutoStart::Busy => log::info!("{} arrived during a run; not starting another", name),
            AutoStart::Disabled => {}
        }
    });
}

fn start_watcher(app: &AppHandle) -> Result<(), AppError> {
    let state = app.state::<AppState>();

    watcher::cleanup_debounce_map(&state.debounce_map);

    let incoming = watcher::watch_incoming(
        app.clone(),
        &state.paths.incoming_dir,
        Arc::clone(&state.debounce_map),
        auto_process_new_file,
    )?;

    let mut slot = state.incoming_watcher.lock().expect("incoming watcher mutex");
    *slot = Some(incoming);
    Ok(())
}

#[tauri::command]
fn start_incoming_watcher(app: AppHandle) -> Result<(), AppError> {
    start_watcher(&app)
}

#[tauri::command]
fn list_incoming(state: State<AppState>) -> Result<Vec<String>, AppError> {
    watcher::list_incoming(&state.paths.incoming_dir)
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let log_level = if cfg!(debug_assertions) {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    tauri::Builder::default()
        .plugin(tauri_plugin_log::Builder::default().level(log_level).build())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_clipboard_manager::init())
        .setup(|app| {
            let paths = Paths::resolve(app.handle())?;
            let settings = settings::load_settings(app.handle());
            app.manage(AppState::new(paths, settings));

            if let Err(e) = start_watcher(app.handle()) {
                log::warn!("incoming watcher not started: {}", e);
            }
            Ok(())
        })
        .on_window_event(|window, event| {
            if let WindowEvent::DragDrop(drag) = event {
                handle_drag_drop(window.app_handle(), drag);
            }
        })
        .invoke_handler(tauri::generate_handler![
            add_dropped_files,
            process_notes,
            get_session,
            clear_console,
            copy_console,
            open_notes_folder,
            get_history,
            clear_history,
            remove_history_entry,
            open_output,
            get_settings,
            update_settings,
            save_settings,
            reset_settings,
            set_dark_mode,
            available_models,
            pick_folder,
            start_incoming_watcher,
            list_incoming,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
