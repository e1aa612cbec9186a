use serde::Serialize;

pub const GREETING: &str = "Drop your notes here to get started!";
pub const CLEARED: &str = "Console cleared";

// Console text plus the counters shown in the stats row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub console: String,
    pub processed_count: u32,
    pub processing: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            console: GREETING.to_string(),
            processed_count: 0,
            processing: false,
        }
    }
}

impl Session {
    pub fn set_console(&mut self, text: impl Into<String>) {
        self.console = text.into();
    }

    pub fn append_console(&mut self, text: &str) {
        self.console.push_str(text);
    }

    /// Clear the console and return the update the webview should apply.
    pub fn clear_console(&mut self) -> ConsoleUpdate {
        let update = ConsoleUpdate::Replace(CLEARED.to_string());
        update.apply(self);
        update
    }

    pub fn record_success(&mut self) {
        self.processed_count += 1;
    }
}

/// How the webview should apply a console change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum ConsoleUpdate {
    Replace(String),
    Append(String),
}

impl ConsoleUpdate {
    pub fn apply(&self, session: &mut Session) {
        match self {
            ConsoleUpdate::Replace(text) => session.set_console(text.as_str()),
            ConsoleUpdate::Append(text) => session.append_console(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_lifecycle() {
        let mut session = Session::default();
        assert_eq!(session.console, GREETING);

        session.set_console("NotePal is processing your notes...\n\n");
        session.append_console("Processing: a.md\n");
        assert_eq!(
            session.console,
            "NotePal is processing your notes...\n\nProcessing: a.md\n"
        );

        let update = session.clear_console();
        assert_eq!(session.console, "Console cleared");
        assert_eq!(update, ConsoleUpdate::Replace("Console cleared".to_string()));
    }

    #[test]
    fn test_record_success_counts() {
        let mut session = Session::default();
        session.record_success();
        session.record_success();
        assert_eq!(session.processed_count, 2);
    }

    #[test]
    fn test_console_update_apply_and_shape() {
        let mut session = Session::default();
        ConsoleUpdate::Replace("a".to_string()).apply(&mut session);
        ConsoleUpdate::Append("b".to_string()).apply(&mut session);
        assert_eq!(session.console, "ab");

        let value = serde_json::to_value(ConsoleUpdate::Append("x".to_string())).unwrap();
        assert_eq!(value["kind"], "append");
        assert_eq!(value["text"], "x");
    }
}
