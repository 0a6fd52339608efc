//! Signed access to the search domain's HTTP API and the index bootstrap
//! sequence that runs over it.

pub mod bootstrap;
pub mod client;
pub mod sigv4;

pub use client::{EsResponse, SearchHttp, SignedClient};
