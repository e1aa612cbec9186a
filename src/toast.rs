use serde::Serialize;
use tauri::{AppHandle, Emitter};

pub const TOAST_EVENT: &str = "toast";

// How long the webview keeps a toast on screen
pub const TOAST_DURATION_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub dismiss_after_ms: u64,
}

impl Toast {
    fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            dismiss_after_ms: TOAST_DURATION_MS,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, ToastKind::Success)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, ToastKind::Error)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, ToastKind::Info)
    }
}

/// Show a toast. A newer toast replaces whatever is on screen.
pub fn notify(app: &AppHandle, toast: Toast) {
    if let Err(e) = app.emit(TOAST_EVENT, &toast) {
        log::warn!("failed to emit toast {:?}: {}", toast.message, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toast_payload_shape() {
        let toast = Toast::error("Processing failed");
        let value = serde_json::to_value(&toast).unwrap();
        assert_eq!(value["message"], "Processing failed");
        assert_eq!(value["kind"], "error");
        assert_eq!(value["dismissAfterMs"], 3000);
    }

    #[test]
    fn test_constructors_pick_kind() {
        assert_eq!(Toast::success("ok").kind, ToastKind::Success);
        assert_eq!(Toast::info("fyi").kind, ToastKind::Info);
    }
}
