use std::io::{self, IsTerminal, Write};

use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A transient, user-facing message (the terminal's stand-in for a toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    fn success(&self, message: &str) {
        self.notify(Notice::success(message));
    }

    fn error(&self, message: &str) {
        self.notify(Notice::error(message));
    }
}

#[derive(Debug, Clone)]
pub struct TerminalNotifier {
    color: bool,
    show_success: bool,
}

impl TerminalNotifier {
    pub fn new(color: bool, show_success: bool) -> Self {
        Self {
            color: color && io::stderr().is_terminal(),
            show_success,
        }
    }

    fn format(&self, notice: &Notice) -> String {
        let (label, code) = match notice.level {
            NoticeLevel::Success => ("ok", "32"),
            NoticeLevel::Error => ("error", "31"),
        };
        if self.color {
            format!("\x1b[{code}m{label}\x1b[0m: {}", notice.message)
        } else {
            format!("{label}: {}", notice.message)
        }
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: Notice) {
        if notice.level == NoticeLevel::Success && !self.show_success {
            debug!(message = %notice.message, "success notice muted");
            return;
        }

        let line = self.format(&notice);
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{line}");
    }
}

/// Keeps every notice in memory; used by embedders that render notices
/// themselves and by tests.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }

    pub fn errors(&self) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter(|notice| notice.level == NoticeLevel::Error)
            .map(|notice| notice.message.clone())
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
