//! The event loop behind `RunWbChargeAsymmetry`.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use wbasym_event::{
    EventError, EventTree, EventTreeReader, Histo1D, ReadMode, TreeWriter, WbChargeAsymmetryEvent,
    read_tree_metadata,
};

use crate::config::RunConfig;
use crate::error::{AnalysisError, Result, io_error};
use crate::histograms::{ControlHistograms, CutflowStep};
use crate::processor::{EventProcessor, Passthrough};

/// Metadata key: era label.
pub const META_KEY_ERA: &str = "wbasym.era";
/// Metadata key: channel selection code.
pub const META_KEY_CHANNEL: &str = "wbasym.channel_selection";
/// Metadata key: charge selection code.
pub const META_KEY_CHARGE: &str = "wbasym.charge_selection";
/// Metadata key: normalization factor applied to every weight.
pub const META_KEY_NORM: &str = "wbasym.norm_factor";
/// Metadata key: SHA-256 of the input file.
pub const META_KEY_INPUT_SHA256: &str = "wbasym.input_sha256";
/// Metadata key: event processor name.
pub const META_KEY_PROCESSOR: &str = "wbasym.processor";
/// Metadata key: control histograms (JSON array of [`Histo1D`]).
pub const META_KEY_HISTOGRAMS: &str = "wbasym.histograms";

/// Counters and provenance of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Input file.
    pub input: String,
    /// Output file.
    pub output: String,
    /// Output tree name.
    pub tree_name: String,
    /// Era label.
    pub era: String,
    /// Channel code.
    pub channel_selection: i32,
    /// Charge code.
    pub charge_selection: i32,
    /// Factor applied to every weight.
    pub norm_factor: f64,
    /// SHA-256 of the input file.
    pub input_sha256: String,
    /// Events read from input.
    pub events_read: u64,
    /// Rows written.
    pub events_written: u64,
    /// Written events with `reco_sel`.
    pub reco_selected: u64,
    /// Written events with `gen_sel`.
    pub gen_selected: u64,
}

fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| io_error(path, e))?;
    let mut h = Sha256::new();
    std::io::copy(&mut file, &mut h).map_err(|e| io_error(path, e))?;
    Ok(hex(&h.finalize()))
}

/// Sibling of `output` written during the loop and renamed into place on success.
fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    output.with_file_name(name)
}

/// Normalization factor from the first bin of `norm` (1.0 without one).
pub fn normalization_factor(norm: Option<&Histo1D>) -> Result<f64> {
    let Some(h) = norm else {
        return Ok(1.0);
    };
    let Some(&k) = h.bin_content.first() else {
        return Err(AnalysisError::Normalization(format!("histogram '{}' has no bins", h.name)));
    };
    if !k.is_finite() {
        return Err(AnalysisError::Normalization(format!(
            "histogram '{}' first bin is not finite ({k})",
            h.name
        )));
    }
    if k <= 0.0 {
        tracing::warn!(norm = k, histogram = %h.name, "non-positive normalization factor");
    }
    Ok(k)
}

fn with_path(path: &Path, e: EventError) -> AnalysisError {
    match e {
        EventError::Io(io) => io_error(path, io),
        other => other.into(),
    }
}

/// Run the analysis with records used as read.
///
/// Equivalent to [`run_with_processor`] with [`Passthrough`].
pub fn run_wb_charge_asymmetry(cfg: &RunConfig, norm: Option<&Histo1D>) -> Result<RunSummary> {
    run_with_processor(cfg, norm, &mut Passthrough)
}

/// Run the analysis, calling `processor` on every event before selection.
///
/// The output only appears at `cfg.output` once the run has succeeded; on error
/// no file is left behind.
pub fn run_with_processor(
    cfg: &RunConfig,
    norm: Option<&Histo1D>,
    processor: &mut dyn EventProcessor,
) -> Result<RunSummary> {
    cfg.validate()?;
    let partial = partial_path(&cfg.output);
    match event_loop(cfg, norm, processor, &partial) {
        Ok(summary) => {
            std::fs::rename(&partial, &cfg.output).map_err(|e| io_error(&cfg.output, e))?;
            Ok(summary)
        }
        Err(e) => {
            if let Err(rm) = std::fs::remove_file(&partial)
                && rm.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %partial.display(), error = %rm, "failed to remove partial output");
            }
            Err(e)
        }
    }
}

fn event_loop(
    cfg: &RunConfig,
    norm: Option<&Histo1D>,
    processor: &mut dyn EventProcessor,
    partial: &Path,
) -> Result<RunSummary> {
    let norm_factor = normalization_factor(norm)?;
    let input_sha256 = sha256_file(&cfg.input)?;
    let selection = cfg.selection();
    let settings = &cfg.settings;

    let mut reader =
        EventTreeReader::open(&cfg.input, ReadMode::Lenient).map_err(|e| with_path(&cfg.input, e))?;
    tracing::info!(
        input = %cfg.input.display(),
        entries = reader.entries(),
        era = %cfg.era,
        channel = cfg.channel.code(),
        charge = cfg.charge.code(),
        norm_factor,
        "starting event loop"
    );

    let tree = EventTree::create(settings.tree_name.clone());
    let mut writer = TreeWriter::create(partial, tree)
        .map_err(|e| with_path(partial, e))?
        .with_flush_rows(settings.flush_rows);
    let mut hists = ControlHistograms::book(&settings.histograms)?;

    let mut ev = WbChargeAsymmetryEvent::new();
    let mut events_read = 0u64;
    let mut reco_selected = 0u64;
    let mut gen_selected = 0u64;

    loop {
        if let Some(max) = settings.max_events
            && events_read >= max
        {
            tracing::info!(max, "stopping at max_events");
            break;
        }
        if !reader.next_into(&mut ev)? {
            break;
        }
        events_read += 1;
        hists.count(CutflowStep::Read);

        processor.process(&mut ev)?;
        ev.scale_weights(norm_factor as f32);

        let outcome = selection.apply(&mut ev);
        if outcome.channel {
            hists.count(CutflowStep::Channel);
        }
        if outcome.charge {
            hists.count(CutflowStep::Charge);
        }

        if cfg.debug {
            tracing::debug!(
                run = ev.run,
                lumi = ev.lumi,
                event = ev.event,
                l_id = ev.lepton.id,
                ntk = ev.ntk(),
                reco_sel = ev.reco_sel,
                gen_sel = ev.gen_sel,
                "event"
            );
        }

        if !(ev.reco_sel || ev.gen_sel) {
            continue;
        }
        if ev.reco_sel {
            reco_selected += 1;
            hists.count(CutflowStep::Reco);
        }
        if ev.gen_sel {
            gen_selected += 1;
            hists.count(CutflowStep::Gen);
        }

        let weight = ev.nominal_weight().map(f64::from).unwrap_or(norm_factor);
        hists.fill(&ev, weight);
        writer.fill(&ev)?;
    }

    let histograms = hists.into_histograms();
    writer.set_metadata(META_KEY_ERA, cfg.era.label());
    writer.set_metadata(META_KEY_CHANNEL, cfg.channel.code().to_string());
    writer.set_metadata(META_KEY_CHARGE, cfg.charge.code().to_string());
    writer.set_metadata(META_KEY_NORM, norm_factor.to_string());
    writer.set_metadata(META_KEY_INPUT_SHA256, input_sha256.clone());
    writer.set_metadata(META_KEY_PROCESSOR, processor.name());
    writer.set_metadata(META_KEY_HISTOGRAMS, serde_json::to_string(&histograms)?);
    let events_written = writer.close()?;

    tracing::info!(events_read, events_written, reco_selected, gen_selected, "event loop done");

    Ok(RunSummary {
        input: cfg.input.display().to_string(),
        output: cfg.output.display().to_string(),
        tree_name: settings.tree_name.clone(),
        era: cfg.era.label().to_string(),
        channel_selection: cfg.channel.code(),
        charge_selection: cfg.charge.code(),
        norm_factor,
        input_sha256,
        events_read,
        events_written,
        reco_selected,
        gen_selected,
    })
}

/// Control histograms stored in an output file.
pub fn read_output_histograms(path: &Path) -> Result<Vec<Histo1D>> {
    let meta = read_tree_metadata(path).map_err(|e| with_path(path, e))?;
    let json = meta.get(META_KEY_HISTOGRAMS).ok_or_else(|| {
        EventError::Metadata(format!("{} has no {META_KEY_HISTOGRAMS} entry", path.display()))
    })?;
    let hists: Vec<Histo1D> = serde_json::from_str(json)?;
    Ok(hists)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_factor_from_first_bin() {
        assert_eq!(normalization_factor(None).unwrap(), 1.0);
        let mut h = Histo1D::uniform("norm", "", 2, 0.0, 2.0).unwrap();
        h.bin_content = vec![0.5, 9.0];
        assert_eq!(normalization_factor(Some(&h)).unwrap(), 0.5);
        h.bin_content[0] = f64::NAN;
        assert!(matches!(
            normalization_factor(Some(&h)),
            Err(AnalysisError::Normalization(_))
        ));
        h.bin_content.clear();
        assert!(normalization_factor(Some(&h)).is_err());
    }

    #[test]
    fn sha256_of_known_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn partial_output_is_a_sibling() {
        assert_eq!(
            partial_path(Path::new("/data/out.parquet")),
            PathBuf::from("/data/out.parquet.partial")
        );
    }
}
