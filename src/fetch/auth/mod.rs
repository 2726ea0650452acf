//! Credential-injecting [`HttpClient`](super::HttpClient) wrappers.

mod basic_auth;
mod url_param;

pub use basic_auth::BasicAuth;
pub use url_param::UrlParam;
