//! Per-event hook run between reading and selection.

use wbasym_event::WbChargeAsymmetryEvent;

use crate::error::Result;

/// Populates or adjusts a freshly read record before selection.
///
/// The record arrives reset and filled from the input row; whatever the
/// processor leaves in it is what the channel/charge selection sees and what
/// gets written.
pub trait EventProcessor {
    /// Process one event.
    fn process(&mut self, ev: &mut WbChargeAsymmetryEvent) -> Result<()>;

    /// Name recorded in the output metadata.
    fn name(&self) -> &str;
}

/// Leaves records as read.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl EventProcessor for Passthrough {
    fn process(&mut self, _ev: &mut WbChargeAsymmetryEvent) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}
