// src/retrieval/mod.rs
// Hybrid retriever: embedding + concept + recency + access scoring across
// heterogeneous candidate sources

mod candidates;
mod retriever;
mod scoring;

pub use candidates::{Candidate, CandidateSource, Corpuscle, RankedResult};
pub use retriever::{RetrievalOutcome, Retriever};
pub use scoring::{
    cosine_similarity, dedup_key, jaccard, normalize_by_source, recency_decay, SystemPrefixes,
};
