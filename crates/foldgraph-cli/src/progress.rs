//! Spinner feedback for long-running commands.
//!
//! Every helper takes and returns `Option<ProgressBar>`; `None` means
//! `--quiet` and turns all calls into no-ops.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner with a message
pub fn spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Replace the spinner message
pub fn update(pb: &Option<ProgressBar>, message: impl Into<String>) {
    if let Some(pb) = pb {
        pb.set_message(message.into());
    }
}

fn finish_with(pb: Option<ProgressBar>, template: &str, prefix: &'static str, message: &str) {
    if let Some(pb) = pb {
        if let Ok(style) = ProgressStyle::default_spinner().template(template) {
            pb.set_style(style);
        }
        pb.set_prefix(prefix);
        pb.finish_with_message(message.to_string());
    }
}

/// Finish a spinner with a success message
pub fn finish_spinner(pb: Option<ProgressBar>, message: &str) {
    finish_with(pb, "{prefix:.green} {msg}", "✓", message);
}

/// Finish a spinner with a warning message
pub fn finish_spinner_warn(pb: Option<ProgressBar>, message: &str) {
    finish_with(pb, "{prefix:.yellow} {msg}", "!", message);
}

/// Finish a spinner with an error message
pub fn finish_spinner_error(pb: Option<ProgressBar>, message: &str) {
    finish_with(pb, "{prefix:.red} {msg}", "✗", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_quiet_returns_none() {
        assert!(spinner("indexing", true).is_none());
    }

    #[test]
    fn test_spinner_not_quiet_returns_some() {
        let pb = spinner("indexing", false);
        assert!(pb.is_some());
        update(&pb, "scanning a.md");
        finish_spinner(pb, "done");
    }

    #[test]
    fn test_helpers_handle_none() {
        update(&None, "ignored");
        finish_spinner(None, "done");
        finish_spinner_warn(None, "warning");
        finish_spinner_error(None, "error");
    }
}
