use base64::Engine as _;
use reqwest::Url;

use crate::{
    config::GitLabConfig,
    pipeline::{ExportError, PointFileSource},
};

/// Fetches the point file through the GitLab repository-files API. The
/// response carries the file content base64-encoded.
pub struct GitLabFileSource {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    token: String,
    path: String,
    branch: String,
}

#[derive(serde::Deserialize)]
struct RepositoryFile {
    content: String,
}

impl GitLabFileSource {
    pub fn new(cfg: &GitLabConfig, ssl_verify: bool) -> Result<Self, ExportError> {
        Ok(Self {
            http: reqwest::Client::builder()
                .danger_accept_invalid_certs(!ssl_verify)
                .build()?,
            base_url: cfg.base_url.clone(),
            project_id: cfg.project_id.clone(),
            token: cfg.private_token.clone(),
            path: cfg.source_path.clone(),
            branch: cfg.branch.clone(),
        })
    }
}

#[async_trait::async_trait]
impl PointFileSource for GitLabFileSource {
    async fn fetch_points_file(&self) -> Result<Vec<u8>, ExportError> {
        let mut url = repository_file_url(&self.base_url, &self.project_id, &self.path)?;
        url.query_pairs_mut().append_pair("ref", &self.branch);

        let file: RepositoryFile = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        decode_file_content(&file.content)
    }
}

/// `GET/PUT /projects/:id/repository/files/:file_path`. The file path is a
/// single URL segment, so its slashes must be percent-encoded.
pub(crate) fn repository_file_url(
    base_url: &str,
    project_id: &str,
    path: &str,
) -> Result<Url, ExportError> {
    let mut url = Url::parse(base_url).map_err(|e| {
        ExportError::InvalidConfiguration(format!("invalid gitlab.base_url '{base_url}': {e}"))
    })?;
    url.path_segments_mut()
        .map_err(|_| {
            ExportError::InvalidConfiguration(format!(
                "gitlab.base_url '{base_url}' cannot be a base"
            ))
        })?
        .pop_if_empty()
        .extend(["projects", project_id, "repository", "files"])
        .push(path);
    Ok(url)
}

pub(crate) fn decode_file_content(content: &str) -> Result<Vec<u8>, ExportError> {
    // GitLab wraps base64 payloads; tolerate embedded newlines.
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ExportError::Source(format!("file content is not valid base64: {e}")))
}
