//! Proxy pool, ban ledger, and log masking.

mod ban_ledger;
mod masking;
mod pool;

pub use ban_ledger::{BanLedger, BanRecord};
pub use masking::{mask_ipv4, mask_proxy_url};
pub use pool::{
    FailureKind, ProxyEndpoint, ProxyLease, ProxyMode, ProxyModule, ProxyPool, ProxyStats,
};
