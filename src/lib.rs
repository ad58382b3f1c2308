//! Semantic similarity engine for voice notes.
//!
//! - [`similarity`]: cosine similarity and pairwise matrices
//! - [`search`]: hybrid lexical and semantic ranking
//! - [`layout`]: force-directed 2-D layout clustered by category and meaning
//! - [`embeddings`]: embedding providers and back-fill
//! - [`notes`], [`store`], [`config`]: the data the engine works on

pub mod config;
pub mod embeddings;
pub mod layout;
pub mod notes;
pub mod search;
pub mod similarity;
pub mod store;
