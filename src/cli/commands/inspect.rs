//! Inspect command: read a file and show the fields it would import

use super::{InputArgs, read_input};
use crate::cli::error::CliError;
use crate::import::ImportResult;
use crate::inference::infer_schema;
use crate::models::InferredField;
use indexmap::IndexMap;
use serde::Serialize;

/// What `inspect` reports about a file
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectReport {
    pub file: String,
    pub format: String,
    pub records: usize,
    /// Record count per geometry type
    pub geometry_types: IndexMap<String, usize>,
    pub fields: Vec<InferredField>,
}

impl InspectReport {
    pub fn build(file: &str, result: &ImportResult) -> Self {
        Self {
            file: file.to_string(),
            format: result.format.to_string(),
            records: result.records.len(),
            geometry_types: result.records.iter().fold(IndexMap::new(), |mut acc, r| {
                *acc.entry(r.geometry.type_name().to_string()).or_insert(0) += 1;
                acc
            }),
            fields: infer_schema(&result.records),
        }
    }

    /// Human-readable summary
    pub fn to_pretty(&self) -> String {
        let geometries: Vec<String> = self
            .geometry_types
            .iter()
            .map(|(kind, count)| format!("{} {}", count, kind))
            .collect();
        let mut out = format!(
            "File: {}\nFormat: {}\nRecords: {} ({})\n",
            self.file,
            self.format,
            self.records,
            geometries.join(", ")
        );
        if self.fields.is_empty() {
            out.push_str("No attribute fields\n");
            return out;
        }

        out.push_str("Fields:\n");
        let width = self.fields.iter().map(|f| f.name.len()).max().unwrap_or(0);
        for field in &self.fields {
            out.push_str(&format!(
                "  {:<width$}  {:<8}  key={}  values={}\n",
                field.name,
                field.field_type.to_string(),
                field.key,
                field.non_null_count,
                width = width
            ));
        }
        out
    }
}

/// Handle the inspect command
pub fn handle_inspect(args: &InputArgs, pretty: bool) -> Result<(), CliError> {
    let (file_name, result) = read_input(args)?;
    let report = InspectReport::build(&file_name, &result);

    if pretty {
        print!("{}", report.to_pretty());
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldType;
    use tempfile::TempDir;

    fn args_for(dir: &TempDir, name: &str, content: &str) -> InputArgs {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        InputArgs {
            input: path,
            content_type: None,
            config_dir: dir.path().to_path_buf(),
            delimiter: None,
        }
    }

    #[test]
    fn test_report_for_csv() {
        let dir = TempDir::new().unwrap();
        let args = args_for(
            &dir,
            "trees.csv",
            "name,height,lat,lon\nOak,12.5,51.5,-0.12\nAsh,8,51.6,-0.13\n",
        );
        let (file_name, result) = read_input(&args).unwrap();
        let report = InspectReport::build(&file_name, &result);

        assert_eq!(report.file, "trees.csv");
        assert_eq!(report.format, "CSV");
        assert_eq!(report.records, 2);
        assert_eq!(report.geometry_types.get("Point"), Some(&2));
        assert_eq!(report.fields[1].field_type, FieldType::Decimal);

        let pretty = report.to_pretty();
        assert!(pretty.contains("Records: 2 (2 Point)"));
        assert!(pretty.contains("height"));
    }

    #[test]
    fn test_delimiter_override() {
        let dir = TempDir::new().unwrap();
        let mut args = args_for(&dir, "trees.csv", "name;lat;lon\nOak;51.5;-0.12\n");
        args.delimiter = Some(';');
        let (_, result) = read_input(&args).unwrap();
        assert_eq!(result.records[0].geometry.type_name(), "Point");
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let args = InputArgs {
            input: dir.path().join("missing.csv"),
            content_type: None,
            config_dir: dir.path().to_path_buf(),
            delimiter: None,
        };
        assert!(matches!(read_input(&args), Err(CliError::FileNotFound(_))));
    }
}
