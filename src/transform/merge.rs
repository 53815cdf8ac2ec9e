use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;

use crate::{
    domain::{BatchResult, MergedColumn, MergedTable},
    pipeline::ExportError,
};

/// Merges the per-batch tables column-wise on their shared time index.
///
/// Alignment is outer: the merged row index is the union of every column's
/// timestamps, and a column without an entry for some row gets a missing
/// value there. Columns keep batch order (results are re-sorted by batch
/// index first), then response order within a batch.
///
/// The index is normalized afterwards: each source timestamp is converted to
/// `target_tz` wall-clock time and rendered as second-precision ISO 8601
/// with the offset suffix stripped. The index is named after the target
/// timezone identifier.
pub fn merge_batches(
    mut results: Vec<BatchResult>,
    target_tz: Tz,
) -> Result<MergedTable, ExportError> {
    results.sort_by_key(|r| r.batch_index);

    // Union of source timestamps, ordered by instant (raw text breaks ties
    // so that distinct representations of one instant stay distinct rows,
    // matching label-based alignment).
    let mut stamps: BTreeSet<(DateTime<FixedOffset>, String)> = BTreeSet::new();
    for result in &results {
        for column in &result.table.columns {
            for raw in column.values.keys() {
                let parsed = DateTime::parse_from_rfc3339(raw)
                    .map_err(|_| ExportError::UnparsableTimestamp(raw.clone()))?;
                stamps.insert((parsed, raw.clone()));
            }
        }
    }
    let ordered: Vec<(DateTime<FixedOffset>, String)> = stamps.into_iter().collect();

    let columns = results
        .iter()
        .flat_map(|result| result.table.columns.iter())
        .map(|column| MergedColumn {
            name: column.name.clone(),
            values: ordered
                .iter()
                .map(|(_, raw)| column.values.get(raw).cloned())
                .collect(),
        })
        .collect();

    let timestamps = ordered
        .iter()
        .map(|(instant, _)| {
            instant
                .with_timezone(&target_tz)
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string()
        })
        .collect();

    Ok(MergedTable {
        index_name: target_tz.name().to_string(),
        timestamps,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SeriesColumn, SeriesTable};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn column(name: &str, entries: &[(&str, f64)]) -> SeriesColumn {
        SeriesColumn {
            name: name.to_string(),
            values: entries
                .iter()
                .map(|(ts, v)| (ts.to_string(), json!(v)))
                .collect(),
        }
    }

    fn batch(index: usize, columns: Vec<SeriesColumn>) -> BatchResult {
        BatchResult {
            batch_index: index,
            table: SeriesTable { columns },
        }
    }

    const TS0: &str = "2024-01-15T08:00:00+00:00";
    const TS1: &str = "2024-01-15T08:05:00+00:00";

    #[test]
    fn concatenates_columns_in_batch_order() {
        let results = vec![
            batch(1, vec![column("4079", &[(TS0, 3.0)])]),
            batch(0, vec![column("4077", &[(TS0, 1.0)]), column("4078", &[(TS0, 2.0)])]),
        ];

        let merged = merge_batches(results, chrono_tz::Europe::Tallinn).unwrap();

        let names: Vec<&str> = merged.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["4077", "4078", "4079"]);
        assert_eq!(merged.timestamps.len(), 1);
        assert_eq!(merged.index_name, "Europe/Tallinn");
    }

    #[test]
    fn mismatched_timestamps_leave_gaps_not_errors() {
        let results = vec![
            batch(0, vec![column("4077", &[(TS0, 1.0)])]),
            batch(1, vec![column("4078", &[(TS1, 2.0)])]),
        ];

        let merged = merge_batches(results, chrono_tz::Europe::Tallinn).unwrap();

        // union index, two rows
        assert_eq!(merged.timestamps.len(), 2);
        assert_eq!(merged.columns[0].values, vec![Some(json!(1.0)), None]);
        assert_eq!(merged.columns[1].values, vec![None, Some(json!(2.0))]);
    }

    #[test]
    fn index_is_converted_to_local_wall_clock_without_offset() {
        // 08:00 UTC is 10:00 in Tallinn during winter (UTC+2).
        let results = vec![batch(0, vec![column("4077", &[(TS0, 1.0)])])];
        let merged = merge_batches(results, chrono_tz::Europe::Tallinn).unwrap();
        assert_eq!(merged.timestamps, ["2024-01-15T10:00:00"]);
    }

    #[test]
    fn offset_suffix_is_stripped_preserving_local_wall_clock() {
        // Already expressed in the target timezone's offset: only the
        // suffix goes away.
        let results = vec![batch(
            0,
            vec![column("4077", &[("2024-01-15T10:00:00+02:00", 1.0)])],
        )];
        let merged = merge_batches(results, chrono_tz::Europe::Tallinn).unwrap();
        assert_eq!(merged.timestamps, ["2024-01-15T10:00:00"]);
    }

    #[test]
    fn rows_are_ordered_by_instant() {
        let results = vec![batch(
            0,
            vec![column("4077", &[(TS1, 2.0), (TS0, 1.0)])],
        )];
        let merged = merge_batches(results, chrono_tz::Europe::Tallinn).unwrap();
        assert_eq!(
            merged.timestamps,
            ["2024-01-15T10:00:00", "2024-01-15T10:05:00"]
        );
        assert_eq!(merged.columns[0].values, vec![Some(json!(1.0)), Some(json!(2.0))]);
    }

    #[test]
    fn column_count_is_the_sum_over_batches() {
        let results = vec![
            batch(0, vec![column("a", &[(TS0, 1.0)]), column("b", &[(TS0, 2.0)])]),
            batch(1, vec![column("c", &[(TS0, 3.0)])]),
            batch(2, vec![column("d", &[(TS0, 4.0)]), column("e", &[(TS0, 5.0)])]),
        ];
        let merged = merge_batches(results, chrono_tz::Europe::Tallinn).unwrap();
        assert_eq!(merged.columns.len(), 5);
    }

    #[test]
    fn unparsable_timestamp_is_reported() {
        let results = vec![batch(0, vec![column("4077", &[("yesterday", 1.0)])])];
        let err = merge_batches(results, chrono_tz::Europe::Tallinn).unwrap_err();
        assert!(matches!(err, ExportError::UnparsableTimestamp(raw) if raw == "yesterday"));
    }

    #[test]
    fn empty_input_merges_to_an_empty_table() {
        let merged = merge_batches(Vec::new(), chrono_tz::Europe::Tallinn).unwrap();
        assert!(merged.timestamps.is_empty());
        assert!(merged.columns.is_empty());
    }
}
