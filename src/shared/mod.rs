//! Shared utilities used by the adapters and the router

pub mod backoff;
