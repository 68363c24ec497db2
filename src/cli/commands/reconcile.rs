//! Reconcile command: compare a file's fields with a category definition

use super::{InputArgs, load_file, read_input};
use crate::cli::error::CliError;
use crate::inference::infer_schema;
use crate::mapping::{ReconciliationResult, reconcile};
use crate::models::{FieldDefinition, FieldMapping};
use serde::Serialize;
use std::path::Path;

/// Reconciliation plus the mapping it suggests
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub reconciliation: ReconciliationResult,
    pub suggested_mapping: FieldMapping,
}

/// Load category fields from a JSON array of field definitions
pub fn load_fields(path: &Path) -> Result<Vec<FieldDefinition>, CliError> {
    let bytes = load_file(path)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        CliError::InvalidArgument(format!(
            "{} is not a list of field definitions: {}",
            path.display(),
            e
        ))
    })
}

/// Human-readable summary of a reconciliation
pub fn format_pretty(result: &ReconciliationResult) -> String {
    let mut out = String::new();
    for m in &result.matched {
        out.push_str(&format!(
            "match     {} -> {} ({})\n",
            m.source, m.target, m.target_type
        ));
    }
    for c in &result.conflicts {
        out.push_str(&format!(
            "conflict  {} ({}) vs {} ({})\n",
            c.source, c.source_type, c.target, c.target_type
        ));
    }
    for field in &result.unmapped_source {
        out.push_str(&format!("unmapped  {} ({})\n", field.name, field.field_type));
    }
    for field in &result.unfilled_target {
        out.push_str(&format!("unfilled  {} (required)\n", field.key));
    }
    for warning in &result.warnings {
        out.push_str(&format!("warning   {}\n", warning));
    }
    if result.is_complete() {
        out.push_str("Every field lines up\n");
    }
    out
}

/// Handle the reconcile command
pub fn handle_reconcile(args: &InputArgs, fields: &Path, pretty: bool) -> Result<(), CliError> {
    let category = load_fields(fields)?;
    let (_, result) = read_input(args)?;
    let inferred = infer_schema(&result.records);
    let reconciliation = reconcile(&inferred, &category);

    if pretty {
        print!("{}", format_pretty(&reconciliation));
    } else {
        let report = ReconcileReport {
            suggested_mapping: reconciliation.suggested_mapping(),
            reconciliation,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
