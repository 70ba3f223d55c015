//! Backend module - transport trait, HTTP client, sessions and downloads

pub mod fetcher;
pub mod http_backend;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;
pub mod traits;

pub use fetcher::RemoteAssetFetcher;
pub use http_backend::HttpTransport;
pub use session::{Session, SessionAcquirer};
pub use traits::{AttemptResponse, Transport};
