//! Reconstruction of `inspect` output.
//!
//! Inspecting several containers makes the runtime print one JSON array per
//! container, back to back, which is not a parsable document. The arrays are
//! split apart by bracket depth, merged into one array and scrubbed of fields
//! that differ between runs.

use std::io::Write;

use serde_json::{Map, Value};
use tracing::{debug, error};

/// Timestamp `State.StartedAt` is pinned to.
pub const ZERO_TIMESTAMP: &str = "0001-01-01T00:00:00Z";

/// Split `input` into its top-level JSON arrays.
///
/// Brackets inside string literals do not count, and a `]` with no open
/// array is ignored.
pub fn extract_outer_arrays(input: &str) -> Vec<&str> {
    let mut arrays = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '[' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            ']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    arrays.push(&input[start..=i]);
                }
            }
            _ => {}
        }
    }

    arrays
}

/// Make one inspected container comparable across runs and platforms.
pub fn normalize_object(object: &mut Map<String, Value>) {
    if let Some(image) = object.get("Image").and_then(Value::as_str).map(str::to_string) {
        if let Some(Value::Object(config)) = object.get_mut("Config") {
            config.insert("Image".to_string(), Value::String(image));
        }
    }
    if let Some(Value::Object(state)) = object.get_mut("State") {
        state.insert("StartedAt".to_string(), Value::String(ZERO_TIMESTAMP.to_string()));
    }
}

/// The merged document and what had to be dropped to build it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reconstruction {
    pub objects: Vec<Value>,
    /// Indexes of fragments that were not valid arrays of objects.
    pub parse_errors: Vec<usize>,
}

pub fn reconstruct(input: &str) -> Reconstruction {
    let mut result = Reconstruction::default();

    for (i, fragment) in extract_outer_arrays(input).into_iter().enumerate() {
        let parsed: Vec<Map<String, Value>> = match serde_json::from_str(fragment) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("Error parsing JSON at index {}: {}", i, e);
                result.parse_errors.push(i);
                continue;
            }
        };

        // One object per array; anything after the first is not part of
        // the runtime's output for a single container.
        let Some(mut object) = parsed.into_iter().next() else {
            debug!(index = i, "skipping empty inspect fragment");
            continue;
        };
        normalize_object(&mut object);
        result.objects.push(Value::Object(object));
    }

    result
}

/// Render the merged document with two-space indentation.
pub fn render(objects: &[Value]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(objects)
}

/// Reconstruct `input` and write the document to `out`.
///
/// Failures are logged, never returned: the relayed command's own result
/// is what the caller reports.
pub fn write_normalized<W: Write>(input: &str, out: &mut W) {
    let reconstruction = reconstruct(input);
    let rendered = match render(&reconstruction.objects) {
        Ok(rendered) => rendered,
        Err(e) => {
            error!("Error marshaling final JSON: {}", e);
            return;
        }
    };
    if let Err(e) = writeln!(out, "{}", rendered) {
        error!("Error writing inspect output: {}", e);
    }
}
