/*
[INPUT]:  HTTP client configuration, session store and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod auth;
pub mod client;
pub mod error;
pub mod market;
pub mod trading;
pub mod user;

pub use error::{Result, SyncError};

pub use client::{ApiClient, ClientConfig, Credential, DEFAULT_BASE_URL};
