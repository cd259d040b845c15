//! Terminal styling tokens.
use console::Style;

/// What a piece of output is, independent of how it gets colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Heading,
    Prompt,
    Info,
    Bar,
    Percent,
    Spinner,
    Success,
    Failure,
}

/// Applies a [`Tone`] to text.
pub trait Styler {
    fn paint(&self, tone: Tone, text: &str) -> String;
}

impl<S: Styler + ?Sized> Styler for &S {
    fn paint(&self, tone: Tone, text: &str) -> String {
        (**self).paint(tone, text)
    }
}

/// Ansi colors via `console`. Colors are dropped automatically when stdout
/// is not a terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleStyler;

impl ConsoleStyler {
    fn style(tone: Tone) -> Style {
        match tone {
            Tone::Heading => Style::new().bold(),
            Tone::Prompt => Style::new().blue().bright(),
            Tone::Info | Tone::Bar | Tone::Success => Style::new().green().bright(),
            Tone::Percent => Style::new().yellow().bright(),
            Tone::Spinner => Style::new().magenta().bright(),
            Tone::Failure => Style::new().red().bright(),
        }
    }
}

impl Styler for ConsoleStyler {
    fn paint(&self, tone: Tone, text: &str) -> String {
        Self::style(tone).apply_to(text).to_string()
    }
}

/// No styling at all.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainStyler;

#[cfg(test)]
impl Styler for PlainStyler {
    fn paint(&self, _: Tone, text: &str) -> String {
        text.to_owned()
    }
}
