use super::{ShortlistHandler, ShortlistTables};
use crate::config::defaults::INJECTED_SIM;
use crate::config::HandlerConfig;
use crate::error::{Result, ShortlistError};
use crate::model::{LabelId, RawCandidates, ShortlistMethod};
use crate::policy::ShortlistPolicy;
use crate::table::KeyedTable;
use hashbrown::HashMap;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

/// Per-instance labels supplied from outside, e.g. by a hard-negative miner.
pub trait DynamicSource: Send + Sync {
    fn labels(&self, index: usize) -> Option<Cow<'_, [LabelId]>>;
}

impl DynamicSource for Vec<Vec<LabelId>> {
    fn labels(&self, index: usize) -> Option<Cow<'_, [LabelId]>> {
        self.get(index).map(|row| Cow::Borrowed(row.as_slice()))
    }
}

impl DynamicSource for HashMap<usize, Vec<LabelId>> {
    fn labels(&self, index: usize) -> Option<Cow<'_, [LabelId]>> {
        self.get(&index).map(|row| Cow::Borrowed(row.as_slice()))
    }
}

impl DynamicSource for KeyedTable<LabelId> {
    fn labels(&self, index: usize) -> Option<Cow<'_, [LabelId]>> {
        self.query(index as u64).ok().map(Cow::Owned)
    }
}

/// Persisted shortlists widened with externally supplied labels.
pub struct ShortlistHandlerExtended {
    policy: ShortlistPolicy,
    tables: ShortlistTables,
    dynamic: Option<Arc<dyn DynamicSource>>,
    corruption: usize,
}

impl ShortlistHandlerExtended {
    pub fn new(config: &HandlerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            policy: ShortlistPolicy::from_config(config),
            tables: ShortlistTables::new(&config.model_dir, config.mode, config.backend()),
            dynamic: None,
            corruption: config.corruption,
        })
    }

    pub fn corruption(&self) -> usize {
        self.corruption
    }

    pub fn has_dynamic(&self) -> bool {
        self.dynamic.is_some()
    }
}

impl ShortlistHandler for ShortlistHandlerExtended {
    fn method(&self) -> ShortlistMethod {
        ShortlistMethod::Extended
    }

    fn policy(&self) -> &ShortlistPolicy {
        &self.policy
    }

    fn policy_mut(&mut self) -> &mut ShortlistPolicy {
        &mut self.policy
    }

    fn is_initialized(&self) -> bool {
        self.tables.data_init()
    }

    fn query(&mut self, index: usize) -> Result<RawCandidates> {
        let source = self.dynamic.as_ref().ok_or(ShortlistError::MissingDynamic)?;
        let mut raw = self.tables.query(index)?;
        let injected = source.labels(index).ok_or(ShortlistError::MissingKey {
            table: "dynamic",
            key: index as u64,
        })?;
        raw.labels.extend_from_slice(&injected);
        raw.sim.resize(raw.labels.len(), INJECTED_SIM);
        Ok(raw)
    }

    fn tables(&self) -> Option<&ShortlistTables> {
        Some(&self.tables)
    }

    fn tables_mut(&mut self) -> Option<&mut ShortlistTables> {
        Some(&mut self.tables)
    }

    fn update_dynamic(&mut self, source: Arc<dyn DynamicSource>) -> Result<()> {
        debug!("replaced dynamic shortlist source");
        self.dynamic = Some(source);
        Ok(())
    }
}
