//! Channel and charge selection codes.

use serde::Serialize;
use wbasym_event::{Lepton, WbChargeAsymmetryEvent};

use crate::error::{AnalysisError, Result};

/// Lepton-flavour channel, selected by the legacy integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSelection {
    /// Code `0`: any flavour.
    Inclusive,
    /// Code `11`.
    Electron,
    /// Code `13`.
    Muon,
}

impl ChannelSelection {
    /// Parse a channel code (`0`, `11` or `13`).
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::Inclusive),
            11 => Ok(Self::Electron),
            13 => Ok(Self::Muon),
            other => Err(AnalysisError::InvalidSelection(format!(
                "channel code {other} (expected 0, 11 or 13)"
            ))),
        }
    }

    /// Legacy integer code.
    pub fn code(self) -> i32 {
        match self {
            Self::Inclusive => 0,
            Self::Electron => 11,
            Self::Muon => 13,
        }
    }

    /// Whether `lepton` belongs to this channel.
    pub fn accepts(self, lepton: &Lepton) -> bool {
        match self {
            Self::Inclusive => true,
            _ => lepton.flavour() == self.code(),
        }
    }
}

/// Lepton charge, selected by the legacy integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeSelection {
    /// Code `0`: either charge.
    Inclusive,
    /// Code `+1`.
    Positive,
    /// Code `-1`.
    Negative,
}

impl ChargeSelection {
    /// Parse a charge code (`0`, `1` or `-1`).
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::Inclusive),
            1 => Ok(Self::Positive),
            -1 => Ok(Self::Negative),
            other => Err(AnalysisError::InvalidSelection(format!(
                "charge code {other} (expected 0, 1 or -1)"
            ))),
        }
    }

    /// Legacy integer code.
    pub fn code(self) -> i32 {
        match self {
            Self::Inclusive => 0,
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }

    /// Whether `lepton` has the selected charge.
    pub fn accepts(self, lepton: &Lepton) -> bool {
        match self {
            Self::Inclusive => true,
            _ => lepton.charge() == self.code(),
        }
    }
}

/// Which flags survived each selection step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionOutcome {
    /// At least one flag left after the channel requirement.
    pub channel: bool,
    /// At least one flag left after the charge requirement.
    pub charge: bool,
}

/// Channel and charge requirements applied to both selection levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Flavour requirement.
    pub channel: ChannelSelection,
    /// Charge requirement.
    pub charge: ChargeSelection,
}

impl Selection {
    /// Clear `reco_sel` / `gen_sel` when the reconstructed / generator-level
    /// lepton fails the requirements. Flags are never raised.
    pub fn apply(&self, ev: &mut WbChargeAsymmetryEvent) -> SelectionOutcome {
        ev.reco_sel &= self.channel.accepts(&ev.lepton);
        ev.gen_sel &= self.channel.accepts(&ev.gen_lepton);
        let channel = ev.reco_sel || ev.gen_sel;

        ev.reco_sel &= self.charge.accepts(&ev.lepton);
        ev.gen_sel &= self.charge.accepts(&ev.gen_lepton);
        let charge = ev.reco_sel || ev.gen_sel;

        SelectionOutcome { channel, charge }
    }
}
