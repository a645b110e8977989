//! Writing tables out.

mod writer;

pub use writer::{OutputFormat, TableWriter};
