//! Augur - resilient multi-provider AI pipeline orchestrator
//!
//! Runs staged pipelines against external AI services. Each call is
//! admitted by a per-service sliding-window rate limiter, guarded by a
//! circuit breaker, retried with exponential backoff when the failure is
//! transient, and, when a stage still fails, recovered through a
//! priority-ordered fallback chain or degraded to a synthesized output.

pub mod api;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod fallback;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod resilience;
