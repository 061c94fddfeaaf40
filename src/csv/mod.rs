//! CSV utilities for parsing

mod parser;

pub use parser::{CsvParser, UnterminatedQuote};
