/// Feed container discovery and observation.
pub mod container_monitor;
/// URL classification.
pub mod content_classifier;
/// Routing and resolver dispatch.
pub mod content_registry;
/// Placeholder, commit and regeneration of embeds.
pub mod embed_lifecycle;
/// Mutation batches to link sequences.
pub mod ingestion;
/// Weak per-node marks.
pub mod node_marks;
/// Shared fetch layer with caching and retry.
pub mod request_cache;


pub use container_monitor::{
    ContainerMonitor, FeedEvent, MonitorCommand, MonitorConfig, MonitorHandle, MonitorState,
    ReadyHook,
};
pub use content_classifier::{classify, clean_host, detect_image};
pub use content_registry::{ContentRegistry, DeclineReason, ResolverSet, Route, route};
pub use embed_lifecycle::{
    EmbedController, LifecycleEvent, RegenerationDecision, RegenerationReport,
    regeneration_decision,
};
pub use ingestion::{IngestionConfig, IngestionPipeline, MessageScanner};
pub use node_marks::NodeMarks;
pub use request_cache::{CacheEntryState, CachePolicy, CacheStats, Payload, RequestCache};
