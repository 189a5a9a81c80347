//! Domain layer containing business entities and contracts.
//!
//! This module defines entities, the generic CRUD model, repository interfaces
//! and the background task model, independent of infrastructure concerns.
//!
//! # Architecture
//!
//! - [`crud`] - Generic model description shared by all stores
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`tasks`] - Background task types, routing and retry policy
//!
//! # Design Principles
//!
//! - Domain layer has no dependencies on infrastructure or presentation layers
//! - Repository traits define contracts implemented by infrastructure layer
//! - Business logic is encapsulated in services (see [`crate::application::services`])

pub mod crud;
pub mod entities;
pub mod repositories;
pub mod tasks;
