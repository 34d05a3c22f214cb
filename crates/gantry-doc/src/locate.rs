//! Best-effort mapping of schema failures onto text positions.
//!
//! The external validator reports failures against the parsed structure, not
//! against text. To show them in the editor gutter we re-serialize the
//! structure and walk the resulting lines, advancing a depth counter each
//! time a line opens the next instance-path segment. Failures whose path (or
//! offending key) cannot be found in the regenerated text are dropped by the
//! caller; key ordering in the regenerated document can diverge from the
//! originally validated structure, so this is explicitly not exhaustive.

use gantry_types::{SchemaFailure, SchemaParams};
use tracing::debug;

/// Sentinel position meaning "top of document".
pub const TOP_OF_DOCUMENT: (i64, i64) = (-1, -1);

/// Resolve one failure to a 1-based `(line, column)` in `lines`, or `None`
/// when no position can be found.
///
/// Missing-property failures report the line of the final matched path
/// segment (the parent key — the missing key itself has no line).
/// Additional-property failures search forward from the fully matched path
/// for the offending key, written as `key:` or `- key:`.
pub fn locate_failure(failure: &SchemaFailure, lines: &[&str]) -> Option<(i64, i64)> {
    let keys: Vec<&str> = failure
        .instance_path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let property = failure.params.property();
    let missing = matches!(failure.params, SchemaParams::MissingProperty(_));

    if keys.is_empty() && missing {
        return Some(TOP_OF_DOCUMENT);
    }

    let mut depth = 0usize;

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();

        if depth < keys.len() {
            let segment = keys[depth];
            let numeric = segment.parse::<usize>().is_ok();
            let opens_segment = key_prefix(trimmed, segment)
                || (numeric && trimmed.starts_with('-'));

            if opens_segment {
                depth += 1;

                if depth == keys.len() && missing {
                    let column = if numeric {
                        column_of(line, "-")
                    } else {
                        column_of(line, segment)
                    };
                    return Some((i as i64 + 1, column));
                }
                continue;
            }
        } else if key_prefix(trimmed, property)
            || trimmed
                .strip_prefix("- ")
                .is_some_and(|rest| key_prefix(rest, property))
        {
            return Some((i as i64 + 1, column_of(line, property)));
        }
    }

    debug!(
        instance_path = %failure.instance_path,
        property, "schema failure has no resolvable position; dropping"
    );
    None
}

fn key_prefix(text: &str, key: &str) -> bool {
    text.strip_prefix(key)
        .is_some_and(|rest| rest.starts_with(':'))
}

fn column_of(line: &str, needle: &str) -> i64 {
    line.find(needle).map(|c| c as i64 + 1).unwrap_or(1)
}
