//! JSON container for a captured (or simulated) ensemble.
use anyhow::{Context, Result};
use pulse_analysis::{Real, TimeBase, TraceEnsemble, ensemble::EnsembleError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};
use tracing::{debug, instrument};

/// Free-form acquisition settings, e.g. trigger level or channel.
pub type Metadata = BTreeMap<String, Value>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnsembleFile {
    pub time_base: Vec<Real>,
    pub traces: Vec<Vec<Real>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl EnsembleFile {
    pub fn from_ensemble(ensemble: &TraceEnsemble, metadata: Metadata) -> Self {
        Self {
            time_base: ensemble.time_base().to_vec(),
            traces: ensemble.to_rows(),
            metadata,
        }
    }

    pub fn to_ensemble(&self) -> Result<TraceEnsemble, EnsembleError> {
        TraceEnsemble::new(TimeBase::new(self.time_base.clone())?, self.traces.clone())
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
        let ensemble_file: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Cannot parse ensemble file {}", path.display()))?;
        debug!(
            events = ensemble_file.traces.len(),
            samples = ensemble_file.time_base.len(),
            "Loaded ensemble file"
        );
        Ok(ensemble_file)
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        debug!(events = self.traces.len(), "Saved ensemble file");
        Ok(())
    }
}
