//! HTTP upstream for profile lookups

mod fetcher;

pub use fetcher::{HttpProfileFetcher, HttpProfileFetcherBuilder};
