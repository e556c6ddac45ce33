//! Refine command implementation
//!
//! Reads an eICR (and optionally its RR), refines it and writes the refined
//! eICR plus a JSON run report into the output directory.

use crate::cli::{exit_code_for, load_or_default, EXIT_CONFIG_ERROR, EXIT_INPUT_ERROR};
use crate::core::refine::{RefinedDocument, Refiner};
use crate::document::Document;
use crate::domain::{ConditionId, RefinerError, Result};
use crate::log_error_with_context;
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};

/// Arguments for the refine command
#[derive(Args, Debug)]
pub struct RefineArgs {
    /// eICR document to refine
    #[arg(long, value_name = "FILE")]
    pub eicr: PathBuf,

    /// Reportability Response paired with the eICR
    #[arg(long, value_name = "FILE")]
    pub rr: Option<PathBuf>,

    /// Condition code (SNOMED CT); repeat for several conditions
    #[arg(long = "condition", value_name = "CODE")]
    pub conditions: Vec<String>,

    /// Write one refined eICR per condition instead of one for all
    #[arg(long, conflicts_with = "reportable")]
    pub per_condition: bool,

    /// Refine once per reportable condition found in the RR
    #[arg(long, requires = "rr", conflicts_with = "conditions")]
    pub reportable: bool,

    /// Directory for refined documents and reports
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

impl RefineArgs {
    /// Execute the refine command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(eicr = %self.eicr.display(), "Starting refine command");

        let config = match load_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                log_error_with_context!(&e, "Failed to load configuration");
                eprintln!("Error: {e}");
                return Ok(EXIT_CONFIG_ERROR);
            }
        };

        let refiner = match Refiner::from_config(&config) {
            Ok(r) => r,
            Err(e) => {
                log_error_with_context!(&e, "Failed to initialise refiner");
                eprintln!("Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let (document, conditions) = match self.read_inputs() {
            Ok(inputs) => inputs,
            Err(e) => {
                log_error_with_context!(&e, "Invalid input");
                eprintln!("Error: {e}");
                return Ok(EXIT_INPUT_ERROR);
            }
        };

        let actions = &config.refinement.sections;
        let outcome = if self.reportable {
            refiner.refine_reportable(&document, actions).await
        } else if self.per_condition {
            refiner
                .refine_per_condition(&document, actions, &conditions)
                .await
        } else {
            refiner
                .refine(&document, actions, &[conditions])
                .await
                .map(|refined| vec![refined])
        };

        let refined = match outcome {
            Ok(refined) => refined,
            Err(e) => {
                log_error_with_context!(&e, "Refinement failed");
                eprintln!("Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if refined.is_empty() {
            println!("No reportable conditions found; nothing written");
            return Ok(0);
        }

        let split = self.reportable || self.per_condition;
        for document in &refined {
            match write_outputs(&self.output_dir, document, split) {
                Ok(path) => println!(
                    "✅ {} ({} sections, {} entries removed)",
                    path.display(),
                    document.sections.len(),
                    document.entries_removed()
                ),
                Err(e) => {
                    log_error_with_context!(&e, "Failed to write refined document");
                    eprintln!("Error: {e}");
                    return Ok(exit_code_for(&e));
                }
            }
        }

        Ok(0)
    }

    fn read_inputs(&self) -> Result<(Document, Vec<ConditionId>)> {
        let eicr = read_file(&self.eicr)?;
        let rr = self.rr.as_deref().map(read_file).transpose()?;

        let conditions = self
            .conditions
            .iter()
            .map(|c| ConditionId::new(c.as_str()).map_err(RefinerError::Configuration))
            .collect::<Result<Vec<_>>>()?;

        Ok((Document::from_bytes(&eicr, rr.as_deref()), conditions))
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| RefinerError::Io(format!("{}: {e}", path.display())))
}

/// Writes the refined eICR and its report, returning the eICR path
fn write_outputs(dir: &Path, refined: &RefinedDocument, split: bool) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let stem = output_stem(refined.conditions.first(), split);
    let eicr_path = dir.join(format!("{stem}.xml"));
    fs::write(&eicr_path, &refined.eicr)?;
    fs::write(dir.join(format!("{stem}.report.json")), refined.report_json()?)?;

    tracing::info!(path = %eicr_path.display(), run_id = %refined.run_id, "Wrote refined eICR");
    Ok(eicr_path)
}

fn output_stem(condition: Option<&ConditionId>, split: bool) -> String {
    match (split, condition) {
        (true, Some(condition)) => format!("refined_eicr_{}", file_safe(condition.as_str())),
        _ => "refined_eicr".to_string(),
    }
}

/// Condition ids can come from the RR; keep only `[A-Za-z0-9._-]`
fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
