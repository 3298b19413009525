// src/memory/mod.rs
// Interaction store: per-session short-term tier + pluggable long-term tier

mod decay;
mod store;
mod types;

pub use decay::{access_boost, age_decay, spawn_decay_scheduler};
pub use store::{InMemoryLongTermStore, LongTermStore, MemoryStore, SparqlLongTermStore};
pub use types::{Interaction, InteractionKind, InteractionMetadata, ScanFilter};
