use chrono::Utc;
use futures::{stream, StreamExt};

use crate::{
    config::AppConfig,
    domain::{BatchResult, TimeWindow},
    sources::point_list,
    transform,
};

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("malformed point file: {0}")]
    MalformedInput(String),
    #[error("point file yielded no usable point references")]
    EmptyInput,
    #[error("could not receive data for batch {batch} at ({start}, {end}): {body}")]
    DataFetch {
        batch: usize,
        start: String,
        end: String,
        body: String,
    },
    #[error("timestamp '{0}' in API response is not RFC 3339")]
    UnparsableTimestamp(String),
    #[error("failed to serialize merged table: {0}")]
    Serialize(String),
    #[error("source error: {0}")]
    Source(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[async_trait::async_trait]
pub trait PointFileSource: Send + Sync {
    async fn fetch_points_file(&self) -> Result<Vec<u8>, ExportError>;
}

#[async_trait::async_trait]
pub trait PointDataApi: Send + Sync {
    async fn fetch_batch(
        &self,
        window: &TimeWindow,
        points: &[String],
        batch_index: usize,
    ) -> Result<BatchResult, ExportError>;
}

#[async_trait::async_trait]
pub trait SnapshotPublisher: Send + Sync {
    async fn publish(
        &self,
        csv_text: &str,
        commit_message: &str,
    ) -> Result<serde_json::Value, ExportError>;
}

/// One full export run: point file -> chunked queries -> merged CSV ->
/// publish. Fails without publishing if any step fails (unless
/// `allow_partial_batches` lets a failed batch be skipped).
pub async fn run(
    cfg: &AppConfig,
    source: &dyn PointFileSource,
    api: &dyn PointDataApi,
    publisher: &dyn SnapshotPublisher,
) -> Result<(), ExportError> {
    let raw = source.fetch_points_file().await?;
    let points = point_list::extract_point_refs(&raw, &cfg.query.point_column)?;
    let batches = transform::chunk_points(&points, cfg.query.chunk_size)?;
    tracing::info!(
        requests = batches.len(),
        points = points.len(),
        "chunked point list"
    );

    let now = Utc::now();
    let window = transform::resolve_window(
        now,
        cfg.query.lookback_minutes,
        cfg.query.end_lookback_minutes,
        cfg.query.round_minutes,
    )?;

    let results = dispatch_all(cfg, api, &window, &batches).await?;
    if results.is_empty() {
        tracing::warn!("no batch produced data, nothing to publish");
        return Ok(());
    }

    let merged = transform::merge_batches(results, cfg.target_timezone()?)?;
    let csv_text = merged.to_csv()?;
    tracing::info!(
        rows = merged.timestamps.len(),
        columns = merged.columns.len(),
        "merged result:\n{csv_text}"
    );

    let commit_message = format!(
        "Automatic upload at: {} UTC",
        now.format("%Y-%m-%dT%H:%M:%S")
    );
    let response = publisher.publish(&csv_text, &commit_message).await?;
    tracing::info!(response = %response, "upload complete");

    Ok(())
}

/// Dispatches every batch against one shared window snapshot. Queries run
/// through an ordered buffered stream (`max_concurrent_requests` wide, 1 =
/// strictly sequential); on a fatal batch failure the stream is dropped,
/// which cancels any in-flight queries.
async fn dispatch_all(
    cfg: &AppConfig,
    api: &dyn PointDataApi,
    window: &TimeWindow,
    batches: &[Vec<String>],
) -> Result<Vec<BatchResult>, ExportError> {
    let width = cfg.query.max_concurrent_requests.max(1);
    let mut in_flight = stream::iter(
        batches
            .iter()
            .enumerate()
            .map(|(index, points)| api.fetch_batch(window, points, index)),
    )
    .buffered(width);

    let mut results = Vec::with_capacity(batches.len());
    while let Some(item) = in_flight.next().await {
        match item {
            Ok(result) => results.push(result),
            Err(e) if cfg.query.allow_partial_batches => {
                tracing::warn!(error = %e, "batch query failed, skipping its points");
            }
            Err(e) => return Err(e),
        }
    }

    // Buffered completion is already in batch order; the merge contract
    // wants index order regardless of how results arrived.
    results.sort_by_key(|r| r.batch_index);
    Ok(results)
}
