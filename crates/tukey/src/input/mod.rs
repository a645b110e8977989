//! Reading delimited files into typed tables.

mod parser;
mod source;

pub use parser::{Parser, ParserConfig};
pub use source::{DataTable, Row, SourceMetadata, NULL_TOKENS};
