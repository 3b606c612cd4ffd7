use crate::{
    cli::AnalyseArgs,
    container::{EnsembleFile, Metadata},
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pulse_analysis::{
    BinPolicy, Characterisation, CharacterisationOptions, GaussianFitter, characterise,
};
use serde::Serialize;
use tracing::instrument;

/// Everything a presenter needs: the characterisation and where its data came from.
#[derive(Debug, Serialize)]
pub struct Report {
    pub generated: DateTime<Utc>,
    pub signal: String,
    pub reference: Option<String>,
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_metadata: Option<Metadata>,
    pub characterisation: Characterisation,
}

impl Report {
    #[instrument(skip_all, fields(signal = %args.signal.display()))]
    pub fn analyse(args: &AnalyseArgs) -> Result<Self> {
        let signal_file = EnsembleFile::load(&args.signal)?;
        let signal = signal_file
            .to_ensemble()
            .with_context(|| format!("Invalid ensemble in {}", args.signal.display()))?;

        let reference_file = args
            .reference
            .as_deref()
            .map(EnsembleFile::load)
            .transpose()?;
        let reference = match (&reference_file, &args.reference) {
            (Some(file), Some(path)) => Some(
                file.to_ensemble()
                    .with_context(|| format!("Invalid ensemble in {}", path.display()))?,
            ),
            _ => None,
        };

        let options = CharacterisationOptions {
            crossing_policy: args.crossing_policy,
            bin_policy: args.bins.map(BinPolicy::fixed).unwrap_or_default(),
            fitter: GaussianFitter::default(),
        };
        let characterisation = characterise(&signal, reference.as_ref(), &options);

        Ok(Self {
            generated: Utc::now(),
            signal: args.signal.display().to_string(),
            reference: args.reference.as_ref().map(|p| p.display().to_string()),
            metadata: signal_file.metadata,
            reference_metadata: reference_file.map(|file| file.metadata),
            characterisation,
        })
    }
}
