//! Cache orchestration and warming services

mod orchestrator;
mod warmer;

pub use orchestrator::{CacheOrchestrator, CleanupReport, StoreRequest};
pub use warmer::{
    CacheWarmer, PreloadStats, TemplateContentSource, UsageAnalytics, WarmingContentSource,
    WarmingStats, WarmingTemplate,
};

#[cfg(test)]
pub use warmer::MockWarmingContentSource;
