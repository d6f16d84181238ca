//! Overwrite check for the one-shot scrape.
//!
//! A manual scrape writes straight over whatever snapshot file is already on
//! disk. When the new harvest is much smaller than the file it replaces, the
//! write is refused unless the caller forces it. The periodic refresh does not
//! use this check.

use crate::error::{AppError, Result};
use crate::models::RefreshConfig;

#[derive(Debug, Clone, Copy)]
pub struct OverwriteGuard {
    max_drop_percent: u8,
    min_baseline: usize,
}

impl Default for OverwriteGuard {
    fn default() -> Self {
        Self::from(&RefreshConfig::default())
    }
}

impl From<&RefreshConfig> for OverwriteGuard {
    fn from(config: &RefreshConfig) -> Self {
        Self {
            max_drop_percent: config.max_drop_percent,
            min_baseline: config.min_baseline,
        }
    }
}

impl OverwriteGuard {
    /// `Ok` when `incoming` events may replace a file holding `existing`.
    ///
    /// An empty harvest never replaces a non-empty file. Otherwise files
    /// smaller than `min_baseline` are always replaced.
    pub fn check(&self, incoming: usize, existing: usize) -> Result<()> {
        let refused = |drop_percent: f64| -> Result<()> {
            log::error!(
                "Refusing to overwrite {} events with {} ({:.1}% fewer)",
                existing,
                incoming,
                drop_percent
            );
            Err(AppError::OverwriteRefused {
                incoming,
                existing,
                drop_percent,
                threshold_percent: self.max_drop_percent,
            })
        };

        if incoming == 0 && existing > 0 {
            return refused(100.0);
        }
        if existing >= self.min_baseline && incoming < existing {
            let drop_percent = (existing - incoming) as f64 * 100.0 / existing as f64;
            if drop_percent > f64::from(self.max_drop_percent) {
                return refused(drop_percent);
            }
        }

        log::debug!("Overwrite ok: {} → {} events", existing, incoming);
        Ok(())
    }
}
