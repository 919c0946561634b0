//! researchmind-hybrid
//!
//! Dense + lexical retrieval fused into one ranking, per-user store
//! lifecycle, and the bounded registry that owns the live stores.

pub mod fusion;
pub mod registry;
pub mod retriever;

pub use fusion::FusionConfig;
pub use registry::{validate_user_id, SharedRetriever, StoreRegistry};
pub use retriever::{HybridHit, HybridRetriever};
