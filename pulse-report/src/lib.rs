//! Command line front end: reads ensemble files, runs the characterisation
//! and presents the result, or writes synthetic ensembles.
pub mod cli;
pub mod container;
pub mod presenter;
pub mod report;
pub mod simulate;

use anyhow::{Context, Result};
use cli::AnalyseArgs;
use report::Report;
use std::{
    fs::File,
    io::{BufWriter, Write},
};
use tracing::info;

/// Analyses the ensembles named in `args` and presents the report.
pub fn analyse(args: &AnalyseArgs) -> Result<Report> {
    let report = Report::analyse(args)?;
    let presenter = args.presenter.presenter();
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Cannot create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            presenter.present(&report, &mut writer)?;
            writer.flush()?;
            info!(path = %path.display(), "Report written");
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            presenter.present(&report, &mut writer)?;
            writer.flush()?;
        }
    }
    Ok(report)
}
