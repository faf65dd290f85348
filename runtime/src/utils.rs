//! Utility functions for interacting with any runtime.

use std::fmt::Write;

/// Converts bytes to a lowercase hexadecimal string.
pub fn hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes.iter() {
        write!(hex, "{byte:02x}").expect("writing to a String cannot fail");
    }
    hex
}
