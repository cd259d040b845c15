use std::{borrow::Cow, ffi::OsStr};
use tokio::process::Command;

pub trait CommandExt {
    /// Adds two arguments.
    fn arg2(&mut self, a: impl ArgString, b: impl ArgString) -> &mut Self;

    /// Shell escaped program & args, for logging.
    fn to_cmd_str(&self) -> String;
}

impl CommandExt for Command {
    fn arg2(&mut self, a: impl ArgString, b: impl ArgString) -> &mut Self {
        self.arg(a.arg_string()).arg(b.arg_string())
    }

    fn to_cmd_str(&self) -> String {
        let cmd = self.as_std();
        std::iter::once(cmd.get_program())
            .chain(cmd.get_args())
            .map(|a| shell_escape::escape(a.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub trait ArgString {
    fn arg_string(&self) -> Cow<'_, OsStr>;
}

macro_rules! impl_arg_string_as_ref {
    ($t:ty) => {
        impl ArgString for $t {
            fn arg_string(&self) -> Cow<'_, OsStr> {
                Cow::Borrowed(self.as_ref())
            }
        }
    };
}
impl_arg_string_as_ref!(String);

macro_rules! impl_arg_string_display {
    ($t:ty) => {
        impl ArgString for $t {
            fn arg_string(&self) -> Cow<'_, OsStr> {
                Cow::Owned(self.to_string().into())
            }
        }
    };
}
impl_arg_string_display!(u8);

impl<T> ArgString for &'_ T
where
    T: ?Sized,
    T: AsRef<OsStr>,
{
    fn arg_string(&self) -> Cow<'_, OsStr> {
        Cow::Borrowed((**self).as_ref())
    }
}

/// Splits raw process output into lines.
///
/// ffmpeg ends its `-stats` lines with a bare `\r` so the terminal overwrites
/// them; both `\r` and `\n` end a line here. Empty lines are dropped.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Next complete line, if any.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let end = self.pending.iter().position(|b| matches!(b, b'\r' | b'\n'))?;
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let line = &line[..end];
            if !line.is_empty() {
                return Some(String::from_utf8_lossy(line).into_owned());
            }
        }
    }

    /// Whatever remains after the last line ending, used at end of stream.
    pub fn take_rest(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        (!rest.is_empty()).then(|| String::from_utf8_lossy(&rest).into_owned())
    }
}
