//! Interactive input & output path prompts.
use crate::console_ext::{Styler, Tone};
use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

const CANCEL: &str = "cancel";

/// Answer to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Value(T),
    /// `cancel` was entered or input ended.
    Cancel,
}

/// Line based prompting over any reader/writer pair.
pub struct Prompter<R, W, S> {
    input: R,
    out: W,
    styler: S,
}

impl<R: BufRead, W: Write, S: Styler> Prompter<R, W, S> {
    pub fn new(input: R, out: W, styler: S) -> Self {
        Self { input, out, styler }
    }

    pub fn welcome(&mut self) -> io::Result<()> {
        writeln!(
            self.out,
            "{}",
            self.styler
                .paint(Tone::Heading, "Welcome to the MKV-to-MP4 Converter (GPU-Accelerated)")
        )?;
        writeln!(self.out, "Type '{CANCEL}' at any prompt to exit.\n")?;
        self.out.flush()
    }

    /// Asks until an existing regular file, or cancel.
    pub fn input_path(&mut self) -> io::Result<Reply<PathBuf>> {
        loop {
            let answer = match self.ask("Enter the path of the input .mkv file:")? {
                Reply::Value(answer) => answer,
                Reply::Cancel => return Ok(Reply::Cancel),
            };
            if Path::new(&answer).is_file() {
                return Ok(Reply::Value(answer.into()));
            }
            self.failure("File does not exist. Please try again.")?;
        }
    }

    /// Asks until a non-empty path, or cancel. The path is not validated.
    pub fn output_path(&mut self) -> io::Result<Reply<PathBuf>> {
        loop {
            match self.ask("Enter the desired output .mp4 file path:")? {
                Reply::Value(answer) if answer.is_empty() => continue,
                Reply::Value(answer) => return Ok(Reply::Value(answer.into())),
                Reply::Cancel => return Ok(Reply::Cancel),
            }
        }
    }

    pub fn canceled(&mut self) -> io::Result<()> {
        self.failure("Process canceled.")
    }

    fn failure(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.out, "{}", self.styler.paint(Tone::Failure, msg))?;
        self.out.flush()
    }

    /// Trimmed answer, `Cancel` for the cancel keyword (any case) or EOF.
    fn ask(&mut self, question: &str) -> io::Result<Reply<String>> {
        write!(self.out, "{} ", self.styler.paint(Tone::Prompt, question))?;
        self.out.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.out)?;
            return Ok(Reply::Cancel);
        }
        let answer = line.trim();
        if answer.eq_ignore_ascii_case(CANCEL) {
            return Ok(Reply::Cancel);
        }
        Ok(Reply::Value(answer.to_owned()))
    }

    #[cfg(test)]
    fn into_output(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console_ext::PlainStyler;

    fn prompter(input: &str) -> Prompter<&[u8], Vec<u8>, PlainStyler> {
        Prompter::new(input.as_bytes(), Vec::new(), PlainStyler)
    }

    #[test]
    fn cancel_input_any_case() {
        for answer in ["cancel\n", "CANCEL\n", "  Cancel  \n"] {
            let mut p = prompter(answer);
            assert_eq!(p.input_path().unwrap(), Reply::Cancel);
        }
    }

    #[test]
    fn input_reprompts_until_file() {
        let existing = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");
        let answers = format!("/no/such/file.mkv\n\n{existing}\n");
        let mut p = prompter(&answers);
        assert_eq!(p.input_path().unwrap(), Reply::Value(existing.into()));

        let out = String::from_utf8(p.into_output()).unwrap();
        assert_eq!(out.matches("File does not exist").count(), 2);
        assert_eq!(out.matches("Enter the path of the input").count(), 3);
    }

    #[test]
    fn input_rejects_directory() {
        let dir = env!("CARGO_MANIFEST_DIR");
        let answers = format!("{dir}\ncancel\n");
        let mut p = prompter(&answers);
        assert_eq!(p.input_path().unwrap(), Reply::Cancel);
    }

    #[test]
    fn input_eof_is_cancel() {
        let mut p = prompter("/no/such/file.mkv\n");
        assert_eq!(p.input_path().unwrap(), Reply::Cancel);
    }

    #[test]
    fn output_accepts_anything_non_empty() {
        let mut p = prompter("\n   \n out dir/new.mp4 \n");
        assert_eq!(p.output_path().unwrap(), Reply::Value("out dir/new.mp4".into()));
    }

    #[test]
    fn output_cancel() {
        let mut p = prompter("Cancel\n");
        assert_eq!(p.output_path().unwrap(), Reply::Cancel);
    }
}
