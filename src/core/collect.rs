//! Purpose: Concatenate JSON arrays pulled from a row stream, bounded by a size cap.
//! Exports: `BoundedCollector`, `collect_bounded`, `DEFAULT_CAP`.
//! Role: Core of `dump`; storage-agnostic so tests can drive it with plain iterators.
//! Invariants: The cap is checked before each row is pulled, never per item.
//! Invariants: A row is appended whole or not at all; overshoot is at most one row.
//! Invariants: Any decode or type failure aborts with no partial result.

use serde_json::Value;

use crate::core::error::{Error, ErrorKind};
use crate::json::parse;

pub const DEFAULT_CAP: usize = 100_000;

#[derive(Debug)]
pub struct BoundedCollector {
    cap: usize,
    rows: u64,
    items: Vec<Value>,
}

impl BoundedCollector {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            rows: 0,
            items: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.cap
    }

    /// Rows appended so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Decodes one row and appends every element of its array.
    pub fn push_row(&mut self, text: &str) -> Result<(), Error> {
        let index = self.rows;
        let value: Value = parse::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("row is not valid json")
                .with_hint(parse::hint_for_error(&err, "row decode"))
                .with_row(index)
                .with_source(err)
        })?;
        match value {
            Value::Array(items) => {
                self.items.extend(items);
                self.rows += 1;
                Ok(())
            }
            other => Err(Error::new(ErrorKind::Type)
                .with_message(format!(
                    "row decoded to {}, expected an array",
                    json_type_name(&other)
                ))
                .with_row(index)),
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }
}

/// Pulls rows until the stream ends or the accumulator reaches `cap`.
///
/// Rows past the cap-reaching one are never pulled from `rows`, so a lazy
/// cursor underneath stops doing work as soon as the cap is met.
pub fn collect_bounded<I>(rows: I, cap: usize) -> Result<Vec<Value>, Error>
where
    I: IntoIterator<Item = Result<String, Error>>,
{
    let mut collector = BoundedCollector::new(cap);
    let mut rows = rows.into_iter();
    while !collector.is_full() {
        let Some(row) = rows.next() else {
            break;
        };
        collector.push_row(&row?)?;
    }
    if collector.is_full() {
        tracing::debug!(
            rows = collector.rows(),
            items = collector.len(),
            cap,
            "cap reached; stopped reading rows"
        );
    }
    Ok(collector.into_items())
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundedCollector, collect_bounded};
    use crate::core::error::{Error, ErrorKind};
    use serde_json::{Value, json};

    fn rows(texts: &[&str]) -> Vec<Result<String, Error>> {
        texts.iter().map(|text| Ok(text.to_string())).collect()
    }

    /// Yields the given rows, then panics if pulled again.
    struct Tripwire {
        rows: std::vec::IntoIter<String>,
    }

    impl Iterator for Tripwire {
        type Item = Result<String, Error>;

        fn next(&mut self) -> Option<Self::Item> {
            match self.rows.next() {
                Some(row) => Some(Ok(row)),
                None => panic!("row stream pulled past the cap"),
            }
        }
    }

    #[test]
    fn concatenates_rows_in_order() {
        let out = collect_bounded(rows(&[r#"[1,2]"#, "[]", r#"["x",{"a":null}]"#]), 100)
            .expect("collect");
        assert_eq!(Value::Array(out), json!([1, 2, "x", {"a": null}]));
    }

    #[test]
    fn empty_stream_yields_empty_array() {
        let out = collect_bounded(Vec::new(), 10).expect("collect");
        assert!(out.is_empty());
    }

    #[test]
    fn zero_cap_reads_nothing() {
        let stream = Tripwire {
            rows: Vec::new().into_iter(),
        };
        let out = collect_bounded(stream, 0).expect("collect");
        assert!(out.is_empty());
    }

    #[test]
    fn overshoot_keeps_whole_row() {
        let out = collect_bounded(rows(&[r#"["a","b","c"]"#]), 2).expect("collect");
        assert_eq!(Value::Array(out), json!(["a", "b", "c"]));
    }

    #[test]
    fn stops_before_row_after_cap() {
        let out = collect_bounded(rows(&[r#"["a"]"#, r#"["b","c","d"]"#]), 1).expect("collect");
        assert_eq!(Value::Array(out), json!(["a"]));
    }

    #[test]
    fn rows_after_cap_are_never_pulled() {
        let stream = Tripwire {
            rows: vec!["[1,2]".to_string(), "[3]".to_string()].into_iter(),
        };
        let out = collect_bounded(stream, 3).expect("collect");
        assert_eq!(Value::Array(out), json!([1, 2, 3]));
    }

    #[test]
    fn duplicates_are_kept() {
        let out = collect_bounded(rows(&["[1,1]", "[1]"]), 10).expect("collect");
        assert_eq!(Value::Array(out), json!([1, 1, 1]));
    }

    #[test]
    fn invalid_json_is_fatal() {
        let err = collect_bounded(rows(&["[1]", "[2,", "[3]"]), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.row(), Some(1));
    }

    #[test]
    fn invalid_json_after_cap_is_not_decoded() {
        let out = collect_bounded(rows(&["[1,2]", "not json"]), 2).expect("collect");
        assert_eq!(Value::Array(out), json!([1, 2]));
    }

    #[test]
    fn non_array_row_is_type_error() {
        let err = collect_bounded(rows(&[r#"{"hits":[]}"#]), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.message(), Some("row decoded to an object, expected an array"));
    }

    #[test]
    fn stream_errors_propagate() {
        let stream = vec![
            Ok("[1]".to_string()),
            Err(Error::new(ErrorKind::Database).with_message("cursor failed")),
        ];
        let err = collect_bounded(stream, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Database);
    }

    #[test]
    fn collector_tracks_rows_and_fullness() {
        let mut collector = BoundedCollector::new(2);
        assert!(collector.is_empty());
        collector.push_row("[true]").expect("push");
        assert!(!collector.is_full());
        collector.push_row("[false, null]").expect("push");
        assert!(collector.is_full());
        assert_eq!(collector.rows(), 2);
        assert_eq!(collector.len(), 3);
    }

    #[test]
    fn items_are_emitted_as_stored() {
        let out = collect_bounded(rows(&[r#"[{"b":1,"a":2},123456789012345678901234567890]"#]), 10)
            .expect("collect");
        assert_eq!(
            serde_json::to_string(&out).unwrap(),
            r#"[{"b":1,"a":2},123456789012345678901234567890]"#
        );
    }
}
