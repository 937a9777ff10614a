//! Chart rendering port.

use crate::domain::error::CandlebotError;
use crate::domain::market::Market;
use std::path::{Path, PathBuf};

pub trait ChartPort {
    /// Render `market` next to `stem`, returning the files written.
    fn render(&self, market: &Market, stem: &Path) -> Result<Vec<PathBuf>, CandlebotError>;
}
