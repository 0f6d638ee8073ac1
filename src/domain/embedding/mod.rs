//! Embedding collaborator trait and vector helpers

mod provider;
mod vector;

pub use provider::EmbeddingProvider;
pub use vector::{
    cosine_similarity, dot, l2_norm, normalize, validate_embedding, NORM_TOLERANCE,
};

#[cfg(test)]
pub use provider::mock::MockEmbeddingProvider;
