#![forbid(unsafe_code)]

//! Keyed memo for async fetches with per-entry expiry and a size bound.
//!
//! The resolver uses it to avoid a directory round trip for every
//! signature check, but nothing here knows about keys or HTTP: any
//! [`Fetch`] implementation can sit behind an [`ExpiringCache`].

pub mod cache;
pub mod clock;
pub mod fetch;

#[cfg(test)]
mod proptests;

pub use cache::{CacheConfig, CacheError, CacheStats, ExpiringCache, GetOptions};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fetch::{fetch_fn, Fetch, FnFetch};
