//! Persisted shortlist: a label-index table and a parallel similarity table.

use crate::error::{Result, ShortlistError};
use crate::model::{LabelId, Mode, RawCandidates, RowSlot};
use crate::table::{KeyedTable, TableBackend};
use crate::utils::{artifact_path, build_path, ShortlistFile};
use std::path::{Path, PathBuf};
use tracing::info;

/// Indices and similarities keyed by instance index.
#[derive(Debug)]
pub struct ShortlistTables {
    model_dir: PathBuf,
    mode: Mode,
    indices: KeyedTable<LabelId>,
    sim: KeyedTable<f32>,
}

impl ShortlistTables {
    pub fn new(model_dir: impl Into<PathBuf>, mode: Mode, backend: TableBackend) -> Self {
        Self {
            model_dir: model_dir.into(),
            mode,
            indices: KeyedTable::named("indices", backend),
            sim: KeyedTable::named("sim", backend),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn backend(&self) -> TableBackend {
        self.indices.backend()
    }

    pub fn data_init(&self) -> bool {
        self.indices.data_init()
    }

    /// Number of instances holding a shortlist.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn query(&self, index: usize) -> Result<RawCandidates> {
        let key = index as u64;
        Ok(RawCandidates {
            labels: self.indices.query(key)?,
            sim: self.sim.query(key)?,
        })
    }

    /// Write one instance's shortlist; returns the instance index it landed under.
    pub fn update(
        &mut self,
        labels: &[LabelId],
        sim: &[f32],
        fname: &str,
        slot: RowSlot,
    ) -> Result<u64> {
        if labels.len() != sim.len() {
            return Err(ShortlistError::invalid_config(format!(
                "shortlist has {} labels but {} similarities",
                labels.len(),
                sim.len()
            )));
        }
        let indices_path = build_path(&self.model_dir, fname, self.mode, ShortlistFile::Indices);
        let sim_path = build_path(&self.model_dir, fname, self.mode, ShortlistFile::Sim);

        let key = self.indices.create(labels, indices_path, slot)?;
        self.sim.create(sim, sim_path, RowSlot::At(key))?;
        Ok(key)
    }

    /// Write consecutive shortlists starting at `start`.
    pub fn update_batch(&mut self, rows: &[RawCandidates], fname: &str, start: RowSlot) -> Result<()> {
        let mut slot = start;
        for row in rows {
            let key = self.update(&row.labels, &row.sim, fname, slot)?;
            slot = RowSlot::At(key + 1);
        }
        Ok(())
    }

    pub fn save(&self, fname: &str) -> Result<()> {
        self.indices
            .save(artifact_path(&self.model_dir, fname, ShortlistFile::Indices))?;
        self.sim
            .save(artifact_path(&self.model_dir, fname, ShortlistFile::Sim))?;
        info!(fname, instances = self.len(), "saved shortlist");
        Ok(())
    }

    pub fn load(&mut self, fname: &str) -> Result<()> {
        self.indices
            .load(artifact_path(&self.model_dir, fname, ShortlistFile::Indices))?;
        self.sim
            .load(artifact_path(&self.model_dir, fname, ShortlistFile::Sim))?;
        info!(
            fname,
            instances = self.len(),
            backend = ?self.backend(),
            "loaded shortlist"
        );
        Ok(())
    }
}
