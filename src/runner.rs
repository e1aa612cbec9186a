use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::history::ProcessedFile;
use crate::toast::Toast;

pub const SHELL: &str = "/bin/bash";
pub const TOOL_PROGRAM: &str = "study-assistant process";

pub const STARTED_MESSAGE: &str = "NotePal is processing your notes...\n\n";

// Shell exit status for "command not found"
const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// The shell line that runs the external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    line: String,
}

impl ToolCommand {
    pub fn for_tool_dir(tool_dir: &Path) -> Self {
        Self {
            line: format!(
                "cd {} && source .venv/bin/activate && {}",
                shell_quote(&tool_dir.to_string_lossy()),
                TOOL_PROGRAM
            ),
        }
    }

    pub fn custom(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }

    pub fn line(&self) -> &str {
        &self.line
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    ToolMissing,
    Failed(i32),
    Terminated,
}

impl RunOutcome {
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => RunOutcome::Succeeded,
            Some(EXIT_COMMAND_NOT_FOUND) => RunOutcome::ToolMissing,
            Some(code) => RunOutcome::Failed(code),
            None => RunOutcome::Terminated,
        }
    }

    pub fn is_success(self) -> bool {
        self == RunOutcome::Succeeded
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub captured: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl RunOutput {
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome::from_exit_code(self.exit_code)
    }
}

/// Decodes a byte stream as UTF-8 without splitting a character that
/// straddles two reads.
#[derive(Debug, Default)]
pub struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let keep_from = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // An incomplete sequence at the end waits for the next read
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let tail = self.pending.split_off(keep_from);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = tail;
        text
    }

    pub fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

fn forward<R>(mut reader: R, tx: mpsc::UnboundedSender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunker = Utf8Chunker::default();
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let text = chunker.push(&buf[..n]);
                    if !text.is_empty() && tx.send(text).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    log::warn!("stopped reading tool output: {}", e);
                    break;
                }
            }
        }
        let rest = chunker.finish();
        if !rest.is_empty() {
            let _ = tx.send(rest);
        }
    })
}

/// Run the tool, handing every output chunk to `on_chunk` as it arrives.
///
/// Stdout and stderr are merged into one stream in arrival order. Returns
/// once both pipes have closed and the shell has exited. There is no
/// timeout.
pub async fn run_tool<F>(command: &ToolCommand, mut on_chunk: F) -> Result<RunOutput, AppError>
where
    F: FnMut(&str),
{
    let started = Instant::now();

    let mut child = Command::new(SHELL)
        .arg("-c")
        .arg(command.line())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(AppError::Spawn)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(forward(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(forward(stderr, tx.clone()));
    }
    drop(tx);

    let mut captured = String::new();
    while let Some(chunk) = rx.recv().await {
        on_chunk(&chunk);
        captured.push_str(&chunk);
    }
    for reader in readers {
        let _ = reader.await;
    }

    let status = child.wait().await?;

    Ok(RunOutput {
        captured,
        exit_code: status.code(),
        duration: started.elapsed(),
    })
}

/// Allows one tool run at a time. The flag clears when the guard drops.
#[derive(Debug)]
pub struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn try_acquire(flag: Arc<AtomicBool>) -> Result<Self, AppError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::AlreadyRunning)?;
        Ok(Self { flag })
    }
}

impl RunGuard {
    /// Run `on_idle` while the run is still held, then release it.
    pub fn release_after(self, on_idle: impl FnOnce()) {
        on_idle();
        drop(self);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Whether a file landing in the incoming folder should start a run.
#[derive(Debug)]
pub enum AutoStart {
    Disabled,
    // A run is in flight; the new file is left for the next run
    Busy,
    Start(RunGuard),
}

pub fn auto_start(enabled: bool, running: &Arc<AtomicBool>) -> AutoStart {
    if !enabled {
        return AutoStart::Disabled;
    }
    match RunGuard::try_acquire(Arc::clone(running)) {
        Ok(guard) => AutoStart::Start(guard),
        Err(_) => AutoStart::Busy,
    }
}

/// What the user sees once a run ends.
#[derive(Debug, Clone)]
pub struct Completion {
    pub console_suffix: String,
    pub toast: Toast,
    pub entry: Option<ProcessedFile>,
}

pub fn complete(result: &Result<RunOutput, AppError>) -> Completion {
    let output = match result {
        Ok(output) => output,
        Err(e) => {
            return Completion {
                console_suffix: format!("\nError: {}", e),
                toast: Toast::error(format!("Error: {}", e)),
                entry: None,
            }
        }
    };

    match output.outcome() {
        RunOutcome::Succeeded => Completion {
            console_suffix: "\n\nProcessing completed successfully!".to_string(),
            toast: Toast::success("Processing completed!"),
            entry: Some(ProcessedFile::succeeded(&output.captured, output.duration)),
        },
        outcome => {
            let mut console_suffix = "\n\nProcessing failed".to_string();
            if outcome == RunOutcome::ToolMissing {
                console_suffix.push_str(
                    "\nThe study-assistant command was not found. Check that it is installed in its virtual environment.",
                );
            }
            Completion {
                console_suffix,
                toast: Toast::error("Processing failed"),
                entry: Some(ProcessedFile::failed(output.duration)),
            }
        }
    }
}
