//! HTTP client for live API probing
//!
//! All outbound traffic goes through [`ProbeClient`], which paces every
//! request through the shared rate limiter and retries on throttling and
//! transport failures.

pub mod probe;

pub use probe::{ProbeClient, ProbeClientConfig, ProbeOutcome};
