//! # shortlist-rs
//!
//! Label shortlists for extreme multi-label classification.
//!
//! Scoring millions of labels per instance is infeasible, so an upstream
//! nearest-neighbour index proposes a small candidate set per instance. This
//! crate persists those candidates, merges them with ground-truth positives,
//! pads them to a fixed width and refreshes them with sampled or externally
//! mined labels.

pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod persistence;
pub mod policy;
pub mod sampler;
pub mod table;
pub mod test_support;
pub mod utils;

// Re-export main types for convenience
pub use config::{HandlerConfig, HandlerOverrides, SamplerConfig};
pub use error::{Result, ShortlistError};
pub use handler::{
    construct_dynamic_with_source, construct_handler, construct_handler_by_name, DynamicSource,
    ShortlistHandler, ShortlistHandlerDynamic, ShortlistHandlerExtended, ShortlistHandlerHybrid,
    ShortlistHandlerStatic, ShortlistTables,
};
pub use model::{FixedShortlist, LabelId, Mode, RawCandidates, RowSlot, ShortlistMethod};
pub use policy::ShortlistPolicy;
pub use sampler::{CandidateSource, NegativeSampler};
pub use table::{KeyedTable, TableBackend};
