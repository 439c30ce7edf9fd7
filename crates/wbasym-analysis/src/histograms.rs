//! Control histograms filled for every written event.

use serde::{Deserialize, Serialize};
use wbasym_event::{Histo1D, WbChargeAsymmetryEvent};

use crate::config::HistogramSetting;
use crate::error::Result;

/// Name of the cut-flow histogram.
pub const CUTFLOW: &str = "cutflow";

/// Steps counted (unweighted) in the cut-flow histogram, one bin each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutflowStep {
    /// Event read from input.
    Read,
    /// A selection flag survived the channel requirement.
    Channel,
    /// A selection flag survived the charge requirement.
    Charge,
    /// Reconstruction-level selection passed.
    Reco,
    /// Generator-level selection passed.
    Gen,
}

impl CutflowStep {
    const ALL: [CutflowStep; 5] =
        [CutflowStep::Read, CutflowStep::Channel, CutflowStep::Charge, CutflowStep::Reco, CutflowStep::Gen];

    fn bin(self) -> usize {
        self as usize
    }
}

/// Selection level a quantity is filled at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Filled when `reco_sel` is set.
    Reco,
    /// Filled when `gen_sel` is set.
    Gen,
}

/// Quantities with a control histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// Reconstructed lepton pt.
    LeptonPt,
    /// Reconstructed lepton eta.
    LeptonEta,
    /// Reconstructed lepton charge.
    LeptonCharge,
    /// Reconstructed jet pt.
    JetPt,
    /// Reconstructed jet eta.
    JetEta,
    /// Jet b-tag discriminant.
    JetCsv,
    /// Number of reconstructed tracks.
    TrackMultiplicity,
    /// Pt of every reconstructed track.
    TrackPt,
    /// Missing transverse momentum.
    MetPt,
    /// Reconstructed vertex count.
    Nvtx,
    /// Generator-level lepton pt.
    GenLeptonPt,
    /// Generator-level jet pt.
    GenJetPt,
    /// Number of generator-level tracks.
    GenTrackMultiplicity,
}

impl Quantity {
    /// Every quantity, in booking order.
    pub const ALL: [Quantity; 13] = [
        Quantity::LeptonPt,
        Quantity::LeptonEta,
        Quantity::LeptonCharge,
        Quantity::JetPt,
        Quantity::JetEta,
        Quantity::JetCsv,
        Quantity::TrackMultiplicity,
        Quantity::TrackPt,
        Quantity::MetPt,
        Quantity::Nvtx,
        Quantity::GenLeptonPt,
        Quantity::GenJetPt,
        Quantity::GenTrackMultiplicity,
    ];

    /// Histogram name.
    pub fn name(self) -> &'static str {
        match self {
            Quantity::LeptonPt => "l_pt",
            Quantity::LeptonEta => "l_eta",
            Quantity::LeptonCharge => "l_charge",
            Quantity::JetPt => "j_pt",
            Quantity::JetEta => "j_eta",
            Quantity::JetCsv => "j_csv",
            Quantity::TrackMultiplicity => "ntk",
            Quantity::TrackPt => "tk_pt",
            Quantity::MetPt => "met_pt",
            Quantity::Nvtx => "nvtx",
            Quantity::GenLeptonPt => "gl_pt",
            Quantity::GenJetPt => "gj_pt",
            Quantity::GenTrackMultiplicity => "ngtk",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Quantity::LeptonPt => "Lepton p_{T} [GeV]",
            Quantity::LeptonEta => "Lepton #eta",
            Quantity::LeptonCharge => "Lepton charge",
            Quantity::JetPt => "Jet p_{T} [GeV]",
            Quantity::JetEta => "Jet #eta",
            Quantity::JetCsv => "CSV discriminator",
            Quantity::TrackMultiplicity => "Track multiplicity",
            Quantity::TrackPt => "Track p_{T} [GeV]",
            Quantity::MetPt => "Missing transverse momentum [GeV]",
            Quantity::Nvtx => "Vertex multiplicity",
            Quantity::GenLeptonPt => "Generator-level lepton p_{T} [GeV]",
            Quantity::GenJetPt => "Generator-level jet p_{T} [GeV]",
            Quantity::GenTrackMultiplicity => "Generator-level track multiplicity",
        }
    }

    /// Selection level that gates filling.
    pub fn level(self) -> Level {
        match self {
            Quantity::GenLeptonPt | Quantity::GenJetPt | Quantity::GenTrackMultiplicity => {
                Level::Gen
            }
            _ => Level::Reco,
        }
    }

    fn default_binning(self) -> (usize, f64, f64) {
        match self {
            Quantity::LeptonPt | Quantity::GenLeptonPt => (20, 0.0, 200.0),
            Quantity::JetPt | Quantity::GenJetPt => (25, 0.0, 250.0),
            Quantity::MetPt => (20, 0.0, 200.0),
            Quantity::LeptonEta | Quantity::JetEta => (25, -2.5, 2.5),
            Quantity::LeptonCharge => (3, -1.5, 1.5),
            Quantity::JetCsv => (20, 0.0, 1.0),
            Quantity::TrackMultiplicity | Quantity::GenTrackMultiplicity => (50, 0.0, 50.0),
            Quantity::TrackPt => (25, 0.0, 50.0),
            Quantity::Nvtx => (50, 0.0, 50.0),
        }
    }

    /// Append the value(s) of this quantity for `ev` to `out`.
    pub fn values(self, ev: &WbChargeAsymmetryEvent, out: &mut Vec<f64>) {
        let f = |x: f32| f64::from(x);
        match self {
            Quantity::LeptonPt => out.push(f(ev.lepton.p4.pt)),
            Quantity::LeptonEta => out.push(f(ev.lepton.p4.eta)),
            Quantity::LeptonCharge => out.push(f64::from(ev.lepton.charge())),
            Quantity::JetPt => out.push(f(ev.jet.p4.pt)),
            Quantity::JetEta => out.push(f(ev.jet.p4.eta)),
            Quantity::JetCsv => out.push(f(ev.jet.csv)),
            Quantity::TrackMultiplicity => out.push(ev.ntk() as f64),
            Quantity::TrackPt => out.extend(ev.tracks.iter().map(|t| f(t.pt))),
            Quantity::MetPt => out.push(f(ev.met_pt)),
            Quantity::Nvtx => out.push(f64::from(ev.nvtx)),
            Quantity::GenLeptonPt => out.push(f(ev.gen_lepton.p4.pt)),
            Quantity::GenJetPt => out.push(f(ev.gen_jet.p4.pt)),
            Quantity::GenTrackMultiplicity => out.push(ev.ngtk() as f64),
        }
    }
}

/// Cut-flow plus one histogram per [`Quantity`].
pub struct ControlHistograms {
    cutflow: Histo1D,
    booked: Vec<(Quantity, Histo1D)>,
    scratch: Vec<f64>,
}

impl ControlHistograms {
    /// Book default histograms, with binning overridden by `settings`.
    pub fn book(settings: &[HistogramSetting]) -> Result<Self> {
        let mut cutflow =
            Histo1D::uniform(CUTFLOW, "Selection step", CutflowStep::ALL.len(), 0.0, 5.0)?;
        cutflow.title = "read;channel;charge;reco;gen".to_string();

        let booked = Quantity::ALL
            .iter()
            .map(|&q| {
                let (bins, lo, hi) = settings
                    .iter()
                    .rev()
                    .find(|s| s.quantity == q)
                    .map(|s| (s.bins, s.lo, s.hi))
                    .unwrap_or_else(|| q.default_binning());
                Ok((q, Histo1D::uniform(q.name(), q.title(), bins, lo, hi)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { cutflow, booked, scratch: Vec::new() })
    }

    /// Count one event at `step`.
    pub fn count(&mut self, step: CutflowStep) {
        self.cutflow.fill(step.bin() as f64 + 0.5, 1.0);
    }

    /// Fill every quantity whose level flag is set on `ev`.
    pub fn fill(&mut self, ev: &WbChargeAsymmetryEvent, weight: f64) {
        for (q, h) in &mut self.booked {
            let active = match q.level() {
                Level::Reco => ev.reco_sel,
                Level::Gen => ev.gen_sel,
            };
            if !active {
                continue;
            }
            self.scratch.clear();
            q.values(ev, &mut self.scratch);
            for &x in &self.scratch {
                h.fill(x, weight);
            }
        }
    }

    /// Look up a histogram by name.
    pub fn get(&self, name: &str) -> Option<&Histo1D> {
        if name == CUTFLOW {
            return Some(&self.cutflow);
        }
        self.booked.iter().map(|(_, h)| h).find(|h| h.name == name)
    }

    /// All histograms, cut-flow first.
    pub fn into_histograms(self) -> Vec<Histo1D> {
        std::iter::once(self.cutflow).chain(self.booked.into_iter().map(|(_, h)| h)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wbasym_event::{Lepton, P4, Track};

    #[test]
    fn defaults_cover_every_quantity() {
        let h = ControlHistograms::book(&[]).unwrap();
        for q in Quantity::ALL {
            assert!(h.get(q.name()).is_some(), "missing {}", q.name());
        }
        assert_eq!(h.get(CUTFLOW).unwrap().n_bins(), 5);
        assert_eq!(h.into_histograms().len(), 14);
    }

    #[test]
    fn settings_override_binning() {
        let s = vec![HistogramSetting { quantity: Quantity::LeptonPt, bins: 4, lo: 20.0, hi: 60.0 }];
        let h = ControlHistograms::book(&s).unwrap();
        assert_eq!(h.get("l_pt").unwrap().bin_edges, vec![20.0, 30.0, 40.0, 50.0, 60.0]);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let s = vec![HistogramSetting { quantity: Quantity::JetPt, bins: 0, lo: 0.0, hi: 1.0 }];
        assert!(ControlHistograms::book(&s).is_err());
    }

    #[test]
    fn fill_respects_levels() {
        let mut h = ControlHistograms::book(&[]).unwrap();
        let mut ev = WbChargeAsymmetryEvent::new();
        ev.reco_sel = true;
        ev.lepton = Lepton { id: -13, p4: P4 { pt: 45.0, ..P4::default() } };
        ev.push_track(Track { pt: 3.0, ..Track::default() }).unwrap();
        ev.push_track(Track { pt: 7.0, ..Track::default() }).unwrap();
        ev.gen_lepton.p4.pt = 44.0;
        h.fill(&ev, 2.0);

        assert_eq!(h.get("l_pt").unwrap().integral(), 2.0);
        assert_eq!(h.get("l_charge").unwrap().bin_content, vec![0.0, 0.0, 2.0]);
        assert_eq!(h.get("tk_pt").unwrap().integral(), 4.0);
        assert_eq!(h.get("ntk").unwrap().bin_content[2], 2.0);
        assert_eq!(h.get("gl_pt").unwrap().integral(), 0.0);
    }

    #[test]
    fn cutflow_counts_steps() {
        let mut h = ControlHistograms::book(&[]).unwrap();
        h.count(CutflowStep::Read);
        h.count(CutflowStep::Read);
        h.count(CutflowStep::Gen);
        assert_eq!(h.get(CUTFLOW).unwrap().bin_content, vec![2.0, 0.0, 0.0, 0.0, 1.0]);
    }
}
