//! Single line progress bar, percentage & spinner.
use crate::console_ext::{Styler, Tone};
use std::io::{self, Write};

pub const SPINNER_FRAMES: [char; 4] = ['|', '/', '-', '\\'];
const FILLED: char = '#';
const EMPTY: char = '-';

pub const MAX_BAR_WIDTH: usize = 50;
pub const MIN_BAR_WIDTH: usize = 10;
/// Columns reserved for brackets, percentage & spinner.
const RESERVED_COLUMNS: usize = 20;

/// Bar width for a terminal `columns` wide.
pub fn bar_width(columns: usize) -> usize {
    columns
        .saturating_sub(RESERVED_COLUMNS)
        .clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH)
}

/// Bar width for the current stdout terminal, 80 columns if unknown.
pub fn terminal_bar_width() -> usize {
    let columns = console::Term::stdout()
        .size_checked()
        .map(|(_, cols)| cols as usize)
        .unwrap_or(80);
    bar_width(columns)
}

/// Completion fraction in `[0, 1]`. `elapsed` is clamped to `[0, total]`.
pub fn fraction(elapsed: f64, total: f64) -> f64 {
    if !(total > 0.0) || !elapsed.is_finite() {
        return 0.0;
    }
    (elapsed.clamp(0.0, total) / total).min(1.0)
}

/// Number of filled cells, always within `[0, width]`.
pub fn filled_len(width: usize, fraction: f64) -> usize {
    ((width as f64 * fraction).round() as usize).min(width)
}

/// Draws progress in place on a single line.
///
/// Every [`render`](Self::render) rewrites the line from a leading `\r` and
/// advances the spinner. Nothing terminates the line until
/// [`end_line`](Self::end_line).
pub struct ProgressRenderer<W, S> {
    out: W,
    styler: S,
    total: f64,
    width: usize,
    phase: usize,
}

impl<W: Write, S: Styler> ProgressRenderer<W, S> {
    pub fn new(out: W, styler: S, total: f64, width: usize) -> Self {
        Self {
            out,
            styler,
            total,
            width,
            phase: 0,
        }
    }

    pub fn render(&mut self, elapsed: f64) -> io::Result<()> {
        let fraction = fraction(elapsed, self.total);
        let filled = filled_len(self.width, fraction);
        let percent = (fraction * 100.0).round() as u32;

        let bar: String = std::iter::repeat(FILLED)
            .take(filled)
            .chain(std::iter::repeat(EMPTY).take(self.width - filled))
            .collect();
        let spinner = SPINNER_FRAMES[self.phase].to_string();
        self.phase = (self.phase + 1) % SPINNER_FRAMES.len();

        write!(
            self.out,
            "\r{} {} {}",
            self.styler.paint(Tone::Bar, &format!("[{bar}]")),
            self.styler.paint(Tone::Percent, &format!("{percent}%")),
            self.styler.paint(Tone::Spinner, &spinner),
        )?;
        self.out.flush()
    }

    /// Renders `elapsed = total`, completing the bar.
    pub fn render_complete(&mut self) -> io::Result<()> {
        self.render(self.total)
    }

    pub fn end_line(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()
    }

    /// Spinner frame index the next render will draw.
    #[cfg(test)]
    fn phase(&self) -> usize {
        self.phase
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}
