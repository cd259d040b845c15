pub mod args;
pub mod convert;
pub mod prompt;

pub use convert::convert;
