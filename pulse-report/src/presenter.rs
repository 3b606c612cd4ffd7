//! Renders a [Report] for people or for other programs.
use crate::report::Report;
use anyhow::Result;
use pulse_analysis::{
    Histogram, characterise::FeatureReport, features::Feature, fit::FitResult,
};
use scopepulse_common::TIMESTAMP_FORMAT;
use std::io::Write;
use strum::{Display, EnumString};

pub trait Presenter {
    fn present(&self, report: &Report, writer: &mut dyn Write) -> Result<()>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum PresenterKind {
    #[default]
    Text,
    Json,
}

impl PresenterKind {
    pub fn presenter(self) -> Box<dyn Presenter> {
        match self {
            PresenterKind::Text => Box::new(TextPresenter::default()),
            PresenterKind::Json => Box::new(JsonPresenter),
        }
    }
}

/// Pretty-printed JSON of the whole report.
pub struct JsonPresenter;

impl Presenter for JsonPresenter {
    fn present(&self, report: &Report, writer: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *writer, report)?;
        writeln!(writer)?;
        Ok(())
    }
}

/// Summary lines per feature followed by a bar chart of its histogram.
pub struct TextPresenter {
    /// Characters in the bar of the fullest bin.
    bar_width: usize,
}

impl Default for TextPresenter {
    fn default() -> Self {
        Self { bar_width: 50 }
    }
}

impl TextPresenter {
    fn write_fit(writer: &mut dyn Write, fit: &FitResult) -> Result<()> {
        writeln!(
            writer,
            "  fit:       mean {:.4} ± {:.4}, sigma {:.4} ± {:.4}, \
             amplitude {:.1} ± {:.1}, chi2/ndf {:.2}/{}",
            fit.mean.value,
            fit.mean.error,
            fit.sigma.value,
            fit.sigma.error,
            fit.amplitude.value,
            fit.amplitude.error,
            fit.chi_squared,
            fit.degrees_of_freedom
        )?;
        Ok(())
    }

    fn write_histogram(&self, writer: &mut dyn Write, histogram: &Histogram) -> Result<()> {
        writeln!(
            writer,
            "  histogram: {} bins of {:.4}, {} entries, {} underflow, {} overflow",
            histogram.bin_count(),
            histogram.bin_width(),
            histogram.entries(),
            histogram.underflow(),
            histogram.overflow()
        )?;
        let counts = histogram.bin_counts();
        let populated = counts
            .iter()
            .position(|&n| n > 0)
            .zip(counts.iter().rposition(|&n| n > 0));
        let (Some(max), Some((first, last))) = (counts.iter().max(), populated) else {
            return Ok(());
        };
        for (center, &count) in histogram
            .bin_centers()
            .zip(counts)
            .skip(first)
            .take(last + 1 - first)
        {
            let bar = "#".repeat((count as usize * self.bar_width).div_ceil(*max as usize));
            writeln!(writer, "  {center:>12.4} | {bar} {count}")?;
        }
        Ok(())
    }

    fn write_feature(
        &self,
        writer: &mut dyn Write,
        feature: Feature,
        report: &FeatureReport,
    ) -> Result<()> {
        let scale = feature.display_scale();
        let summary = report.summary.scaled(scale);
        writeln!(
            writer,
            "  mean:      {:.4} ± {:.4} {} ({} events)",
            summary.mean,
            summary.standard_error,
            feature.unit(),
            summary.count
        )?;
        if let Some(jitter_error) = report.jitter_error {
            writeln!(
                writer,
                "  jitter:    {:.4} ± {:.4}",
                summary.standard_error,
                jitter_error * scale
            )?;
        }
        if !report.skipped.is_empty() {
            writeln!(
                writer,
                "  skipped:   {} events without a threshold crossing",
                report.skipped.len()
            )?;
        }
        match &report.fit {
            Ok(fit) => Self::write_fit(writer, fit)?,
            Err(e) => writeln!(writer, "  fit:       failed, {e}")?,
        }
        self.write_histogram(writer, &report.histogram)
    }
}

impl Presenter for TextPresenter {
    fn present(&self, report: &Report, writer: &mut dyn Write) -> Result<()> {
        let characterisation = &report.characterisation;
        writeln!(
            writer,
            "Pulse report {}",
            report.generated.format(TIMESTAMP_FORMAT)
        )?;
        writeln!(
            writer,
            "Signal: {} ({} events, {} polarity)",
            report.signal, characterisation.events, characterisation.polarity
        )?;
        if let Some(reference) = &report.reference {
            writeln!(writer, "Reference: {reference}")?;
        }
        for (key, value) in &report.metadata {
            writeln!(writer, "  {key} = {value}")?;
        }
        for outcome in &characterisation.features {
            writeln!(writer)?;
            writeln!(writer, "{}", outcome.feature.title())?;
            match &outcome.report {
                Ok(feature_report) => self.write_feature(writer, outcome.feature, feature_report)?,
                Err(e) => writeln!(writer, "  failed: {e}")?,
            }
        }
        Ok(())
    }
}
