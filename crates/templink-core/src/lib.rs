//! Templink Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Entity`, `ComponentRef`, `Item`, `Owner`, `Linkage`, `Conflict`
//! - **Port definitions** - The `EntityRepository` trait implemented by storage adapters
//! - **Configuration** - Engine limits and logging settings
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external dependencies.
//! Ports define trait interfaces that adapter crates implement. The
//! propagation engine itself lives in `templink-sync` and orchestrates
//! domain entities through the port interface.

pub mod config;
pub mod domain;
pub mod ports;
