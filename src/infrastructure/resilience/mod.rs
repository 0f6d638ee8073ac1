//! Fault isolation for dependencies that can fail independently

mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
