//! Dataset persistence port.

use crate::domain::error::CandlebotError;
use crate::domain::market::{Market, MarketFrame};
use crate::domain::output::OutputFrame;

/// Result of loading a dataset: the frames that parsed, plus what was skipped.
#[derive(Debug, Clone, Default)]
pub struct LoadedDataset {
    pub market: Market,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

pub trait DatasetPort {
    /// Write every frame, and every output paired with one.
    fn save(&self, market: &Market) -> Result<(), CandlebotError>;

    fn save_frame(&self, frame: &MarketFrame) -> Result<(), CandlebotError>;

    fn save_output(&self, output: &OutputFrame) -> Result<(), CandlebotError>;

    /// Malformed files are skipped and reported, never fatal.
    fn load(&self) -> Result<LoadedDataset, CandlebotError>;
}
