//! Outbound HTTP: fetcher, pacing, and challenge-bypass routing.

mod bypass;
mod client;
mod pacing;

pub use bypass::BypassRoute;
pub use client::{PageFetcher, PageSource};
pub use pacing::{PaceClass, Pacer};
