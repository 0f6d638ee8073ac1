//! Infrastructure layer - tier implementations and backend adapters

pub mod cache;
pub mod embedding;
pub mod logging;
pub mod resilience;
pub mod semantic_cache;
pub mod services;
pub mod vector_store;
