use super::{ShortlistHandler, ShortlistTables};
use crate::config::HandlerConfig;
use crate::error::Result;
use crate::model::{RawCandidates, ShortlistMethod};
use crate::policy::ShortlistPolicy;

/// Shortlists read from persisted tables only.
#[derive(Debug)]
pub struct ShortlistHandlerStatic {
    policy: ShortlistPolicy,
    tables: ShortlistTables,
}

impl ShortlistHandlerStatic {
    pub fn new(config: &HandlerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            policy: ShortlistPolicy::from_config(config),
            tables: ShortlistTables::new(&config.model_dir, config.mode, config.backend()),
        })
    }
}

impl ShortlistHandler for ShortlistHandlerStatic {
    fn method(&self) -> ShortlistMethod {
        ShortlistMethod::Static
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
        self.tables.query(index)
    }

    fn tables(&self) -> Option<&ShortlistTables> {
        Some(&self.tables)
    }

    fn tables_mut(&mut self) -> Option<&mut ShortlistTables> {
        Some(&mut self.tables)
    }
}
