//! Console styling for `check` and `admit` output.

use colored::Colorize;

/// Styling helpers.
pub(crate) struct Theme;

impl Theme {
    /// Report title.
    pub(crate) fn title(text: &str) -> String {
        text.bold().cyan().to_string()
    }

    /// Heading for a block of lines.
    pub(crate) fn section(text: &str) -> String {
        text.cyan().to_string()
    }

    /// Outcome line for an accepted connection.
    pub(crate) fn accepted() -> String {
        format!("{} {}", "✓".green(), "ACCEPTED".green().bold())
    }

    /// Outcome line for a refused connection.
    pub(crate) fn refused(reason: &str) -> String {
        format!("{} {} {}", "✗".red(), "REFUSED".red().bold(), reason.red())
    }

    /// A fatal problem.
    pub(crate) fn failure(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Something that will not stop startup but needs attention.
    pub(crate) fn caution(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// A passed check.
    pub(crate) fn passed(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Secondary detail.
    pub(crate) fn note(text: &str) -> String {
        text.dimmed().to_string()
    }

    /// An origin's allowed paths; `None` means no ceiling.
    pub(crate) fn allowed_paths(paths: Option<&[String]>) -> String {
        match paths {
            Some([]) => "(none)".red().to_string(),
            Some(paths) => paths.join(", "),
            None => "any (no path ceiling)".dimmed().to_string(),
        }
    }
}
