//! Fuzz target for the table parser.
//!
//! Malformed CSV/TSV input must produce an error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tukey::Parser;

fuzz_target!(|data: &[u8]| {
    if data.len() > 100_000 {
        return;
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = Parser::new().parse_str(text);
    }

    if let Ok(mut temp_file) = tempfile::NamedTempFile::new() {
        if temp_file.write_all(data).is_ok() {
            let _ = Parser::new().parse_file(temp_file.path());
        }
    }
});
