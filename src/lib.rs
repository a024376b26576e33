//! Cache-aside consistency layer for a forum content service.
//!
//! The [`cache`] module wraps the persistent repositories declared in
//! [`application::repos`] with read-through / write-invalidate decorators.
//! [`infra`] provides the cache store adapters, an in-memory source of
//! truth, and telemetry bootstrap.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
