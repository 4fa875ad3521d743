//! yinyang-lineage: derivation chains over image-generation records.
//!
//! A generation request may be made against an image produced by an earlier
//! request. This crate recovers those parent links from each record's input
//! URL, assembles the root-to-leaf chains, and memoizes them behind a cache
//! keyed by a cheap signal read from the store.
//!
//! - [`resolve`]: parent link for one record, pure
//! - [`assemble`]: chains from resolved records, cycle-guarded
//! - [`pass`]: one fetch → resolve → assemble pass over a [`RecordStore`]
//! - [`cache`]: [`ChainCache`], the entry point for the presentation layer
//! - [`inputs`]: distinct-input listings
//!
//! [`RecordStore`]: yinyang_storage::RecordStore

pub mod assemble;
pub mod cache;
pub mod config;
pub mod inputs;
mod issue;
pub mod pass;
pub mod resolve;

pub use assemble::{assemble, Assembly, Chain, ChainLink, ResolvedRecord};
pub use cache::{CacheSignal, CacheStatus, ChainCache, ChainsView};
pub use config::{ChainPolicy, ConfigError, LineageConfig, SignalMode};
pub use inputs::{distinct_input_urls, input_variants, InputVariants, VariantPair};
pub use issue::LineageIssue;
pub use pass::{reconstruct, Reconstruction};
pub use resolve::{resolve_parent, LinkTable, ParentLink, Resolution, Variant};
