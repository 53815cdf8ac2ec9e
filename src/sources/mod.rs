pub mod gitlab_file;
pub mod isr_api;
pub mod point_list;

pub use gitlab_file::GitLabFileSource;
pub use isr_api::IsrApiClient;
