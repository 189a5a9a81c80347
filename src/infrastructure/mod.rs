//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for persistence, caching, task transport and
//! metrics export.
//!
//! # Modules
//!
//! - [`cache`] - Caching abstractions (Redis and in-memory implementations)
//! - [`observability`] - Prometheus recorder installation
//! - [`persistence`] - PostgreSQL and in-memory repository implementations
//! - [`tasks`] - Task broker, queue workers and scheduler

pub mod cache;
pub mod observability;
pub mod persistence;
pub mod tasks;
