//! Reportability command implementation

use crate::cli::{exit_code_for, EXIT_INPUT_ERROR};
use crate::core::reportability::extract;
use crate::document::{decode_text, XmlTree};
use crate::domain::{JurisdictionReportableConditions, Result};
use crate::log_error_with_context;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the reportability command
#[derive(Args, Debug)]
pub struct ReportabilityArgs {
    /// Reportability Response document
    #[arg(long, value_name = "FILE")]
    pub rr: PathBuf,

    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}

impl ReportabilityArgs {
    /// Execute the reportability command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(rr = %self.rr.display(), "Extracting reportable conditions");

        let bytes = match std::fs::read(&self.rr) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("Error: {}: {e}", self.rr.display());
                return Ok(EXIT_INPUT_ERROR);
            }
        };

        let conditions = match reportable_conditions(&decode_text(&bytes)) {
            Ok(c) => c,
            Err(e) => {
                log_error_with_context!(&e, "Reportability extraction failed");
                eprintln!("Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let json = if self.compact {
            serde_json::to_string(&conditions)?
        } else {
            serde_json::to_string_pretty(&conditions)?
        };
        println!("{json}");
        Ok(0)
    }
}

fn reportable_conditions(rr: &str) -> Result<Vec<JurisdictionReportableConditions>> {
    let tree = XmlTree::parse(rr)?;
    extract(&tree)
}
