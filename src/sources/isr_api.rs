use std::{collections::BTreeMap, time::Duration};

use reqwest::Url;

use crate::{
    config::DataApiConfig,
    domain::{BatchResult, SeriesColumn, SeriesTable, TimeWindow},
    pipeline::{ExportError, PointDataApi},
};

/// Client for the ISR time-series API. One GET per batch: the shared window
/// plus one repeated `scada_point` parameter per requested ref.
pub struct IsrApiClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(serde::Deserialize)]
struct IsrResponse {
    data: serde_json::Map<String, serde_json::Value>,
}

impl IsrApiClient {
    pub fn new(cfg: &DataApiConfig, ssl_verify: bool) -> Result<Self, ExportError> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(cfg.request_timeout_secs))
                .danger_accept_invalid_certs(!ssl_verify)
                .build()?,
            base_url: cfg.base_url.clone(),
        })
    }

    fn build_query(&self, window: &TimeWindow, points: &[String]) -> Result<Url, ExportError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ExportError::InvalidConfiguration(format!(
                "invalid data_api.base_url '{}': {e}",
                self.base_url
            ))
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("start_time", &window.start_param());
            pairs.append_pair("end_time", &window.end_param());
            for point in points {
                pairs.append_pair("scada_point", point);
            }
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl PointDataApi for IsrApiClient {
    async fn fetch_batch(
        &self,
        window: &TimeWindow,
        points: &[String],
        batch_index: usize,
    ) -> Result<BatchResult, ExportError> {
        let url = self.build_query(window, points)?;
        tracing::info!(query = batch_index + 1, url = %url, "dispatching query");

        let response = self.http.get(url).send().await?;
        let body = response.text().await?;

        let table = parse_series_response(&body).map_err(|reason| {
            tracing::error!(batch = batch_index, error = %reason, "unusable batch response");
            ExportError::DataFetch {
                batch: batch_index,
                start: window.start_param(),
                end: window.end_param(),
                body: body.clone(),
            }
        })?;

        Ok(BatchResult { batch_index, table })
    }
}

/// Schema check at the API boundary: the body must be a JSON object whose
/// `data` field maps each column name to a timestamp-keyed object.
fn parse_series_response(body: &str) -> Result<SeriesTable, String> {
    let response: IsrResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;

    let mut columns = Vec::with_capacity(response.data.len());
    for (name, series) in response.data {
        let serde_json::Value::Object(entries) = series else {
            return Err(format!("series '{name}' is not a timestamp-keyed object"));
        };
        let values: BTreeMap<String, serde_json::Value> = entries.into_iter().collect();
        columns.push(SeriesColumn { name, values });
    }

    Ok(SeriesTable { columns })
}
