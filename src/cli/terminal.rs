//! Coloured report lines

use std::{fmt::Display, sync::OnceLock};

use owo_colors::{OwoColorize, Style, colors::css};

/// How a piece of the release report is shown.
#[derive(Debug, Clone, Copy)]
pub enum Tone {
    /// The release was written.
    Released,
    /// Nothing was written.
    DryRun,
    /// Labels and notes.
    Muted,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Released => Style::new().fg::<css::Green>(),
            Self::DryRun => Style::new().fg::<css::Orange>(),
            Self::Muted => Style::new().dimmed(),
        }
    }

    /// Styles `text`, leaving it plain when standard output has no colour.
    pub fn paint<T: Display + ?Sized>(self, text: &T) -> String {
        if colour_enabled() {
            text.style(self.style()).to_string()
        } else {
            text.to_string()
        }
    }
}

fn colour_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| supports_color::on(supports_color::Stream::Stdout).is_some())
}
