//! Formatting helpers for wire-level diagnostics

use std::fmt;

/// Hex dump of a byte slice, 16 bytes per row with a printable-ASCII column.
///
/// ```text
/// 8286 8441 0f77 7777 2e65 7861 6d70 6c65 | ...A.www.example
/// 2e63 6f6d                               | .com
/// ```
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.0.chunks(16).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }

            let mut hex = String::with_capacity(39);
            for (j, pair) in row.chunks(2).enumerate() {
                if j > 0 {
                    hex.push(' ');
                }
                for byte in pair {
                    hex.push_str(&format!("{:02x}", byte));
                }
            }

            let ascii: String = row
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                .collect();

            write!(f, "{:<39} | {}", hex, ascii)?;
        }
        Ok(())
    }
}

/// Eight-digit binary form of a byte, e.g. `00101010`.
pub fn to_bin(byte: u8) -> String {
    format!("{:08b}", byte)
}
