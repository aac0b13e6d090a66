//! Styles for CLI output, plain when the stream is not a terminal

use console::Term;
use owo_colors::Style;
use std::sync::OnceLock;

static STDOUT: OnceLock<Theme> = OnceLock::new();
static STDERR: OnceLock<Theme> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Theme {
    pub heading: Style,
    pub passed: Style,
    pub failed: Style,
    pub caution: Style,
    /// Field names in `label: value` lines
    pub label: Style,
    /// Dataset names in plans and tables
    pub dataset: Style,
    /// Rendered references, `Dataset.row.column`
    pub reference: Style,
    /// Rows removed during teardown
    pub cleared: Style,
}

impl Theme {
    /// Colored only when `term` is a terminal and colors are not turned off
    pub fn for_term(term: &Term) -> Self {
        Self::new(term.is_term() && console::colors_enabled())
    }

    pub fn new(colored: bool) -> Self {
        if !colored {
            return Self::plain();
        }
        Self {
            heading: Style::new().cyan().bold(),
            passed: Style::new().green().bold(),
            failed: Style::new().red().bold(),
            caution: Style::new().yellow().bold(),
            label: Style::new().white().dimmed(),
            dataset: Style::new().blue().bold(),
            reference: Style::new().bright_black().italic(),
            cleared: Style::new().magenta().dimmed(),
        }
    }

    pub fn plain() -> Self {
        Self {
            heading: Style::new(),
            passed: Style::new(),
            failed: Style::new(),
            caution: Style::new(),
            label: Style::new(),
            dataset: Style::new(),
            reference: Style::new(),
            cleared: Style::new(),
        }
    }
}

/// Theme for stdout: plans, tables, progress
pub fn theme() -> &'static Theme {
    STDOUT.get_or_init(|| Theme::for_term(&Term::stdout()))
}

/// Theme for stderr, where errors and warnings go
pub fn err_theme() -> &'static Theme {
    STDERR.get_or_init(|| Theme::for_term(&Term::stderr()))
}
