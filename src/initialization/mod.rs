//! Startup wiring: logger and HTTP stack construction.

mod clients;
mod logger;

pub use clients::{build_fetcher, init_direct_client, init_proxied_clients};
pub use logger::init_logger_with;
