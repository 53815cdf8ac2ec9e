pub mod merge;

pub use merge::merge_batches;

use chrono::{DateTime, Duration, Utc};

use crate::{domain::TimeWindow, pipeline::ExportError};

/// Partitions the point list into contiguous batches of at most
/// `max_chunk_size` refs, preserving order. An empty list yields no batches.
pub fn chunk_points(
    points: &[String],
    max_chunk_size: usize,
) -> Result<Vec<Vec<String>>, ExportError> {
    if max_chunk_size == 0 {
        return Err(ExportError::InvalidConfiguration(
            "chunk_size must be positive".to_string(),
        ));
    }
    Ok(points
        .chunks(max_chunk_size)
        .map(|chunk| chunk.to_vec())
        .collect())
}

/// Computes the window shared by every batch query of a run.
///
/// `start = floor(now - lookback, granularity)`; without an explicit end
/// lookback the end equals the start (single-instant query).
pub fn resolve_window(
    now: DateTime<Utc>,
    lookback_minutes: i64,
    end_lookback_minutes: Option<i64>,
    round_minutes: i64,
) -> Result<TimeWindow, ExportError> {
    if round_minutes <= 0 {
        return Err(ExportError::InvalidConfiguration(
            "round_minutes must be positive".to_string(),
        ));
    }

    let start = floor_to_granularity(now - Duration::minutes(lookback_minutes), round_minutes)?;
    let end = match end_lookback_minutes {
        Some(minutes) => floor_to_granularity(now - Duration::minutes(minutes), round_minutes)?,
        None => start,
    };

    if start > end {
        return Err(ExportError::InvalidConfiguration(format!(
            "window start {start} is after window end {end}"
        )));
    }

    Ok(TimeWindow { start, end })
}

fn floor_to_granularity(
    instant: DateTime<Utc>,
    minutes: i64,
) -> Result<DateTime<Utc>, ExportError> {
    let step = minutes * 60;
    let secs = instant.timestamp();
    let floored = secs - secs.rem_euclid(step);
    DateTime::from_timestamp(floored, 0).ok_or_else(|| {
        ExportError::InvalidConfiguration(format!("window instant {instant} is out of range"))
    })
}
