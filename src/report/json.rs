use anyhow::Result;

use crate::engine::SyncReport;

/// Render a sync report as pretty-printed JSON
pub fn render(report: &SyncReport) -> Result<String> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(json)
}
