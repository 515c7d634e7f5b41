use colorful::Color;
use colorful::Colorful;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A message meant for the user, e.g. shown as a toast by the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Prints a notice to the console, e.g. `[AUTH] Logged out.`
pub(crate) fn echo(tag: &str, notice: &Notice) {
    #[cfg(windows)]
    println!("[{}] {}", tag, notice.message);

    #[cfg(not(windows))]
    {
        let line = format!("[{}] {}", tag, notice.message);
        match notice.level {
            NoticeLevel::Error => {
                println!("{}", line.gradient_with_color(Color::Red, Color::Yellow))
            }
            _ => println!(
                "{}",
                line.gradient_with_color(Color::Cyan, Color::SpringGreen4)
            ),
        }
    }
}
