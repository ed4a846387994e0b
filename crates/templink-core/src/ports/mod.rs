//! Port definitions (trait interfaces for adapters)

pub mod entity_repository;

pub use entity_repository::EntityRepository;
