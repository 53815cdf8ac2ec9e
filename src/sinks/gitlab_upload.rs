use crate::{
    config::GitLabConfig,
    pipeline::{ExportError, SnapshotPublisher},
    sources::gitlab_file::repository_file_url,
};

/// Publishes the merged CSV back to the repository as a commit on the
/// configured branch, via a form-encoded PUT to the repository-files API.
pub struct GitLabUploadSink {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    token: String,
    path: String,
    branch: String,
}

impl GitLabUploadSink {
    pub fn new(cfg: &GitLabConfig, ssl_verify: bool) -> Result<Self, ExportError> {
        Ok(Self {
            http: reqwest::Client::builder()
                .danger_accept_invalid_certs(!ssl_verify)
                .build()?,
            base_url: cfg.base_url.clone(),
            project_id: cfg.project_id.clone(),
            token: cfg.private_token.clone(),
            path: cfg.upload_path.clone(),
            branch: cfg.branch.clone(),
        })
    }
}

#[async_trait::async_trait]
impl SnapshotPublisher for GitLabUploadSink {
    async fn publish(
        &self,
        csv_text: &str,
        commit_message: &str,
    ) -> Result<serde_json::Value, ExportError> {
        let url = repository_file_url(&self.base_url, &self.project_id, &self.path)?;

        let form = [
            ("branch", self.branch.as_str()),
            ("commit_message", commit_message),
            ("content", csv_text),
        ];

        self.http
            .put(url)
            .header("PRIVATE-TOKEN", &self.token)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await
            .map_err(ExportError::from)
    }
}
