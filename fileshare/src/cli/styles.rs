// (c) 2026 fileshare contributors
//! Console colours for help text and error reports
//!
//! Colour is decided once at startup from `NO_COLOR`, `CLICOLOR_FORCE` and whether stderr is a
//! terminal; see [configure_colours]. Everything else asks [use_colours].

use anstyle::{AnsiColor, Color, Style};
use clap::builder::styling::Styles;
use std::io::IsTerminal as _;

const fn fg(colour: AnsiColor) -> Style {
    Style::new().fg_color(Some(Color::Ansi(colour)))
}

const ERROR: Style = fg(AnsiColor::Red).bold();
const WARNING: Style = fg(AnsiColor::Yellow).bold();
const HIGHLIGHT: Style = fg(AnsiColor::Cyan);
const HEADING: Style = fg(AnsiColor::Yellow).underline();

/// Styles for clap's help and usage output
pub(crate) const CLAP_STYLES: Styles = Styles::styled()
    .usage(HEADING)
    .header(HEADING)
    .literal(Style::new().bold())
    .invalid(WARNING)
    .error(ERROR)
    .valid(HIGHLIGHT.bold().underline())
    .placeholder(HIGHLIGHT);

/// Style for the `Error:` prefix of a failure report, or no style if colour is off.
///
/// Display it to start the style, and with `{:#}` to end it.
#[must_use]
pub fn error() -> Style {
    if use_colours() { ERROR } else { Style::new() }
}

/// Are we configured to use terminal colours?
#[must_use]
pub fn use_colours() -> bool {
    console::colors_enabled_stderr()
}

/// Decides colour from the environment, per <https://bixense.com/clicolors/>.
/// `NO_COLOR` wins over `CLICOLOR_FORCE`, which wins over terminal detection.
fn wants_colour(no_color: Option<&str>, clicolor_force: Option<&str>, is_terminal: bool) -> bool {
    let set = |v: Option<&str>| v.is_some_and(|s| !s.is_empty());
    if set(no_color) {
        false
    } else {
        set(clicolor_force) || is_terminal
    }
}

/// Applies the colour decision to the `console` crate, which `indicatif` also follows
pub(crate) fn configure_colours() {
    let no_color = std::env::var("NO_COLOR").ok();
    let force = std::env::var("CLICOLOR_FORCE").ok();
    let state = wants_colour(
        no_color.as_deref(),
        force.as_deref(),
        std::io::stderr().is_terminal(),
    );
    console::set_colors_enabled(state);
    console::set_colors_enabled_stderr(state);
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::wants_colour;

    #[test]
    fn colour_decision() {
        assert!(!wants_colour(Some("1"), Some("1"), true));
        assert!(wants_colour(Some(""), Some("1"), false));
        assert!(wants_colour(None, None, true));
        assert!(!wants_colour(None, Some(""), false));
    }
}
