//! Report output port trait.

use crate::domain::analytics::AnalyticsReport;
use crate::domain::error::RisklabError;
use std::path::Path;

/// Port for writing analytics reports.
pub trait ReportPort {
    fn write(&self, report: &AnalyticsReport, output: &Path) -> Result<(), RisklabError>;
}
