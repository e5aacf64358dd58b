// src/mapping.rs

//! Field name aggregation for heterogeneous follower records.

use std::collections::HashSet;

use crate::models::FollowerRecord;

/// Collect every distinct field name across `records`, in first-seen order.
pub fn aggregate_field_names<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a FollowerRecord>,
{
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key) {
                names.push(key.to_string());
            }
        }
    }
    names
}

/// Append `extra` names that are not already part of `fields`.
pub fn extend_field_names(fields: &mut Vec<String>, extra: &[&str]) {
    for name in extra {
        if !fields.iter().any(|f| f == name) {
            fields.push((*name).to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> FollowerRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_first_seen_order() {
        let records = vec![record(json!({"a": 1, "b": 2})), record(json!({"b": 3, "c": 4}))];
        assert_eq!(aggregate_field_names(&records), ["a", "b", "c"]);
    }

    #[test]
    fn test_empty_input() {
        let records: Vec<FollowerRecord> = Vec::new();
        assert!(aggregate_field_names(&records).is_empty());
    }

    #[test]
    fn test_each_name_once() {
        let records = vec![
            record(json!({"pk": 1, "username": "a"})),
            record(json!({"username": "b", "pk": 2, "is_verified": false})),
            record(json!({})),
            record(json!({"is_verified": true, "full_name": "C"})),
        ];
        assert_eq!(
            aggregate_field_names(&records),
            ["pk", "username", "is_verified", "full_name"]
        );
    }

    #[test]
    fn test_extend_skips_present() {
        let mut fields = vec!["pk".to_string(), "follower_count".to_string()];
        extend_field_names(&mut fields, &["follower_count", "following_count"]);
        assert_eq!(fields, ["pk", "follower_count", "following_count"]);
    }
}
