//! Helpers for working with ordered YAML mappings.
//!
//! `serde_yaml::Mapping` preserves insertion order, which is what lets the
//! editor keep unrecognized keys exactly where the user wrote them. All
//! structure manipulation in the model goes through these helpers.

use serde_yaml::{Mapping, Value};

fn key(k: &str) -> Value {
    Value::String(k.to_string())
}

pub fn get<'a>(map: &'a Mapping, k: &str) -> Option<&'a Value> {
    map.get(key(k))
}

pub fn get_mut<'a>(map: &'a mut Mapping, k: &str) -> Option<&'a mut Value> {
    map.get_mut(key(k))
}

pub fn set(map: &mut Mapping, k: &str, value: Value) {
    map.insert(key(k), value);
}

/// Remove a key, preserving the order of the remaining entries.
pub fn remove(map: &mut Mapping, k: &str) {
    map.shift_remove(key(k));
}

/// Walk a path of nested mapping keys.
pub fn get_path<'a>(map: &'a Mapping, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = get(map, first)?;
    for k in rest {
        current = current.as_mapping().and_then(|m| get(m, k))?;
    }
    Some(current)
}

pub fn get_str<'a>(map: &'a Mapping, k: &str) -> Option<&'a str> {
    get(map, k).and_then(Value::as_str)
}

pub fn str_at<'a>(map: &'a Mapping, path: &[&str]) -> Option<&'a str> {
    get_path(map, path).and_then(Value::as_str)
}

/// A `commands`-style sequence of strings at a nested path. Non-string
/// entries are skipped.
pub fn strings_at(map: &Mapping, path: &[&str]) -> Vec<String> {
    get_path(map, path)
        .and_then(Value::as_sequence)
        .map(|seq| {
            seq.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn string_sequence(items: &[String]) -> Value {
    Value::Sequence(items.iter().map(|s| Value::String(s.clone())).collect())
}

/// The nested mapping under `k`, inserting an empty one when the key is
/// absent or holds a non-mapping value.
pub fn ensure_map<'a>(map: &'a mut Mapping, k: &str) -> &'a mut Mapping {
    let needs_reset = !matches!(get(map, k), Some(Value::Mapping(_)));
    if needs_reset {
        set(map, k, Value::Mapping(Mapping::new()));
    }
    match get_mut(map, k) {
        Some(Value::Mapping(m)) => m,
        _ => unreachable!("key was just set to a mapping"),
    }
}

/// Reorder `map` by a key-preference table.
///
/// Each key is ranked by the table, unknown keys by `other_rank`; the sort is
/// stable, so keys sharing a rank keep their original insertion order. This
/// is how the serializer pins `version`/`name`/`agent` to the top and
/// `blocks`/`promotions` to the bottom while passthrough keys stay put.
pub fn preferred_key_order(map: Mapping, preferences: &[(&str, i64)], other_rank: i64) -> Mapping {
    let rank = |k: &Value| -> i64 {
        k.as_str()
            .and_then(|k| preferences.iter().find(|(p, _)| *p == k))
            .map(|(_, r)| *r)
            .unwrap_or(other_rank)
    };

    let mut pairs: Vec<(Value, Value)> = map.into_iter().collect();
    pairs.sort_by_key(|(k, _)| rank(k));
    pairs.into_iter().collect()
}
