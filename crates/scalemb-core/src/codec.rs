//! Text encoding of an embedding inside a single CSV cell: `[0.1, 0.2, 0.3]`.
//!
//! Values are written with Rust's shortest round-trip `f32` formatting, so a
//! parsed cell reproduces the original bits.

use crate::error::{Error, Result};

pub fn format_vector(v: &[f32]) -> String {
    let body = v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(", ");
    format!("[{body}]")
}

pub fn parse_vector(cell: &str) -> Result<Vec<f32>> {
    let inner = cell
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| Error::Schema(format!("embedding cell is not bracketed: '{}'", truncate(cell))))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| Error::Schema(format!("bad embedding value '{}': {}", part.trim(), e)))
        })
        .collect()
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(40) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
