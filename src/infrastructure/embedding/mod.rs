//! Embedding provider implementations

mod http_client;
mod openai;

pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::{OpenAiEmbeddingProvider, DEFAULT_EMBEDDING_MODEL};

#[cfg(test)]
pub use http_client::MockHttpClientTrait;
