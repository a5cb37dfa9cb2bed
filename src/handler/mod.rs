//! # Handler Module
//!
//! Shortlist handlers share one contract, [`ShortlistHandler`], and differ in
//! where their raw candidates come from:
//!
//! | Variant    | Candidates                                   | Width                 |
//! |------------|----------------------------------------------|-----------------------|
//! | `static`   | persisted table                              | `size`                |
//! | `dynamic`  | fresh sample per call                        | `size`                |
//! | `hybrid`   | persisted table + fresh sample               | `size + corruption`   |
//! | `extended` | persisted table + externally supplied labels | `size + corruption`   |

mod dynamic;
mod extended;
mod hybrid;
mod static_handler;
mod tables;

pub use dynamic::ShortlistHandlerDynamic;
pub use extended::{DynamicSource, ShortlistHandlerExtended};
pub use hybrid::ShortlistHandlerHybrid;
pub use static_handler::ShortlistHandlerStatic;
pub use tables::ShortlistTables;

use crate::config::HandlerConfig;
use crate::error::{Result, ShortlistError};
use crate::model::{FixedShortlist, LabelId, Mode, RawCandidates, RowSlot, ShortlistMethod};
use crate::policy::ShortlistPolicy;
use crate::sampler::CandidateSource;
use std::sync::Arc;
use tracing::info;

/// Common contract of every shortlist handler.
pub trait ShortlistHandler: Send {
    fn method(&self) -> ShortlistMethod;

    fn policy(&self) -> &ShortlistPolicy;

    fn policy_mut(&mut self) -> &mut ShortlistPolicy;

    /// Whether the candidate source holds any data yet.
    fn is_initialized(&self) -> bool;

    /// Raw candidates for an instance, before adjustment.
    fn query(&mut self, index: usize) -> Result<RawCandidates>;

    fn tables(&self) -> Option<&ShortlistTables> {
        None
    }

    fn tables_mut(&mut self) -> Option<&mut ShortlistTables> {
        None
    }

    fn mode(&self) -> Mode {
        self.policy().mode()
    }

    /// Width of every emitted shortlist.
    fn size_shortlist(&self) -> usize {
        self.policy().size_shortlist()
    }

    fn num_labels(&self) -> usize {
        self.policy().num_labels()
    }

    fn padding_index(&self) -> LabelId {
        self.policy().padding_index()
    }

    /// Fixed-width shortlist for an instance.
    ///
    /// Returns an all-zero triple while the handler has no data.
    fn get_shortlist(
        &mut self,
        index: usize,
        pos_labels: Option<&[LabelId]>,
    ) -> Result<FixedShortlist> {
        if !self.is_initialized() {
            return Ok(FixedShortlist::zeros(self.size_shortlist()));
        }
        let raw = self.query(index)?;
        let policy = self.policy_mut();
        let raw = policy.map_labels(raw);
        Ok(policy.adjust(pos_labels.unwrap_or(&[]), &raw))
    }

    /// Store the shortlist produced for one instance.
    fn update_shortlist(
        &mut self,
        labels: &[LabelId],
        sim: &[f32],
        fname: &str,
        slot: RowSlot,
    ) -> Result<u64> {
        self.tables_mut()
            .ok_or(ShortlistError::Unsupported("update_shortlist"))?
            .update(labels, sim, fname, slot)
    }

    /// Store shortlists for consecutive instances starting at `start`.
    fn update_shortlist_batch(
        &mut self,
        rows: &[RawCandidates],
        fname: &str,
        start: RowSlot,
    ) -> Result<()> {
        self.tables_mut()
            .ok_or(ShortlistError::Unsupported("update_shortlist_batch"))?
            .update_batch(rows, fname, start)
    }

    fn save_shortlist(&self, fname: &str) -> Result<()> {
        self.tables()
            .ok_or(ShortlistError::Unsupported("save_shortlist"))?
            .save(fname)
    }

    fn load_shortlist(&mut self, fname: &str) -> Result<()> {
        self.tables_mut()
            .ok_or(ShortlistError::Unsupported("load_shortlist"))?
            .load(fname)
    }

    /// Supply externally mined labels appended to every static row.
    fn update_dynamic(&mut self, _source: Arc<dyn DynamicSource>) -> Result<()> {
        Err(ShortlistError::Unsupported("update_dynamic"))
    }

    /// Instances with a stored shortlist, for table-backed handlers.
    fn num_instances(&self) -> Option<usize> {
        self.tables().map(ShortlistTables::len)
    }
}

/// Build the handler named by `config.method`.
pub fn construct_handler(
    config: &HandlerConfig,
    label_mapping: Option<Arc<[LabelId]>>,
) -> Result<Box<dyn ShortlistHandler>> {
    let mut handler: Box<dyn ShortlistHandler> = match config.method {
        ShortlistMethod::Static => Box::new(ShortlistHandlerStatic::new(config)?),
        ShortlistMethod::Extended => Box::new(ShortlistHandlerExtended::new(config)?),
        ShortlistMethod::Hybrid => Box::new(ShortlistHandlerHybrid::new(config)?),
        ShortlistMethod::Dynamic => Box::new(ShortlistHandlerDynamic::new(config)?),
    };
    handler.policy_mut().set_label_mapping(label_mapping);
    info!(
        method = %config.method,
        mode = %config.mode,
        size_shortlist = handler.size_shortlist(),
        num_labels = config.num_labels,
        backend = ?config.backend(),
        "constructed shortlist handler"
    );
    Ok(handler)
}

/// Build a handler from a method name, failing on names no variant answers to.
pub fn construct_handler_by_name(
    method: &str,
    config: &HandlerConfig,
    label_mapping: Option<Arc<[LabelId]>>,
) -> Result<Box<dyn ShortlistHandler>> {
    let config = HandlerConfig {
        method: method.parse()?,
        ..config.clone()
    };
    construct_handler(&config, label_mapping)
}

/// Build a dynamic handler around a caller-supplied candidate source.
pub fn construct_dynamic_with_source(
    config: &HandlerConfig,
    source: Box<dyn CandidateSource>,
    label_mapping: Option<Arc<[LabelId]>>,
) -> Result<Box<dyn ShortlistHandler>> {
    let mut handler = ShortlistHandlerDynamic::with_source(config, source)?;
    handler.policy_mut().set_label_mapping(label_mapping);
    Ok(Box::new(handler))
}
