//! The per-event record written one row per kept collision event.

use serde::Serialize;

use crate::bounded::BoundedVec;
use crate::error::Result;

/// Capacity of the event-weight sequence.
pub const MAX_WEIGHTS: usize = 1000;
/// Capacity of each (reconstructed or generator-level) track sequence.
pub const MAX_TRACKS: usize = 100;

/// Four-vector in (pt, eta, phi, m) coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct P4 {
    /// Transverse momentum.
    pub pt: f32,
    /// Pseudorapidity.
    pub eta: f32,
    /// Azimuthal angle.
    pub phi: f32,
    /// Mass.
    pub m: f32,
}

/// Charged lepton with signed PDG identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Lepton {
    /// Signed PDG id (e.g. 11 = e⁻, -13 = μ⁺).
    pub id: i32,
    /// Kinematics.
    pub p4: P4,
}

impl Lepton {
    /// Electric charge derived from the PDG id: particles (positive id) are negative.
    ///
    /// Returns 0 for an unset lepton or a non-charged-lepton id.
    pub fn charge(&self) -> i32 {
        match self.id.abs() {
            11 | 13 | 15 => -self.id.signum(),
            _ => 0,
        }
    }

    /// Flavour code `|id|`.
    pub fn flavour(&self) -> i32 {
        self.id.abs()
    }
}

/// Reconstructed jet with its b-tag discriminant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RecoJet {
    /// Kinematics.
    pub p4: P4,
    /// CSV b-tag discriminant.
    pub csv: f32,
}

/// Generator-level jet with its hadron flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GenJet {
    /// Kinematics.
    pub p4: P4,
    /// Flavour code.
    pub flavor: i32,
}

/// Charged track associated to the jet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Track {
    /// Electric charge.
    pub charge: i32,
    /// Particle identity code.
    pub id: i32,
    /// Transverse momentum.
    pub pt: f32,
    /// Pseudorapidity.
    pub eta: f32,
    /// Azimuthal angle.
    pub phi: f32,
}

/// Bounded track sequence.
pub type Tracks = BoundedVec<Track, MAX_TRACKS>;
/// Bounded weight sequence.
pub type Weights = BoundedVec<f32, MAX_WEIGHTS>;

/// Reconstructed and generator-level content of one event.
///
/// One instance is owned by the event loop and reused: populate, write a row,
/// then [`reset`](Self::reset) before the next event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WbChargeAsymmetryEvent {
    /// Run number.
    pub run: u32,
    /// Event number.
    pub event: u32,
    /// Luminosity block.
    pub lumi: u32,
    /// Analysis category code.
    pub cat: u32,
    /// Number of reconstructed vertices.
    pub nvtx: u32,
    /// Event weights; the first one is nominal.
    #[serde(serialize_with = "serialize_slice")]
    pub weights: Weights,

    /// Passed the reconstruction-level selection.
    pub reco_sel: bool,
    /// Passed the generator-level selection.
    pub gen_sel: bool,

    /// Reconstructed lepton.
    pub lepton: Lepton,
    /// Reconstructed jet.
    pub jet: RecoJet,
    /// Reconstructed tracks associated to the jet.
    #[serde(serialize_with = "serialize_slice")]
    pub tracks: Tracks,
    /// Missing transverse momentum magnitude.
    pub met_pt: f32,
    /// Missing transverse momentum azimuth.
    pub met_phi: f32,

    /// Reconstructed jet multiplicity.
    pub nj: i32,
    /// Generator-level jet multiplicity.
    pub ngj: i32,

    /// Generator-level lepton.
    pub gen_lepton: Lepton,
    /// Generator-level jet.
    pub gen_jet: GenJet,
    /// Generator-level tracks.
    #[serde(serialize_with = "serialize_slice")]
    pub gen_tracks: Tracks,
}

fn serialize_slice<S, T, const N: usize>(
    v: &BoundedVec<T, N>,
    s: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: Serialize,
{
    s.collect_seq(v.iter())
}

impl WbChargeAsymmetryEvent {
    /// A cleared record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every field to zero/false and empty every sequence.
    ///
    /// Allocations of the bounded sequences are kept.
    pub fn reset(&mut self) {
        self.run = 0;
        self.event = 0;
        self.lumi = 0;
        self.cat = 0;
        self.nvtx = 0;
        self.weights.clear();
        self.reco_sel = false;
        self.gen_sel = false;
        self.lepton = Lepton::default();
        self.jet = RecoJet::default();
        self.tracks.clear();
        self.met_pt = 0.0;
        self.met_phi = 0.0;
        self.nj = 0;
        self.ngj = 0;
        self.gen_lepton = Lepton::default();
        self.gen_jet = GenJet::default();
        self.gen_tracks.clear();
    }

    /// Number of weight variations (`nw`).
    pub fn nw(&self) -> usize {
        self.weights.len()
    }

    /// Number of reconstructed tracks (`ntk`).
    pub fn ntk(&self) -> usize {
        self.tracks.len()
    }

    /// Number of generator-level tracks (`ngtk`).
    pub fn ngtk(&self) -> usize {
        self.gen_tracks.len()
    }

    /// Nominal weight, or `None` when no weights are set.
    pub fn nominal_weight(&self) -> Option<f32> {
        self.weights.first().copied()
    }

    /// Append a weight variation.
    pub fn push_weight(&mut self, w: f32) -> Result<()> {
        self.weights.push(w).map_err(|e| e.for_field("weight"))
    }

    /// Append a reconstructed track.
    pub fn push_track(&mut self, tk: Track) -> Result<()> {
        self.tracks.push(tk).map_err(|e| e.for_field("tk"))
    }

    /// Append a generator-level track.
    pub fn push_gen_track(&mut self, tk: Track) -> Result<()> {
        self.gen_tracks.push(tk).map_err(|e| e.for_field("gtk"))
    }

    /// Multiply every weight by `factor`.
    pub fn scale_weights(&mut self, factor: f32) {
        for w in self.weights.as_mut_slice() {
            *w *= factor;
        }
    }
}
