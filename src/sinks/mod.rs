pub mod gitlab_upload;

pub use gitlab_upload::GitLabUploadSink;
