//! CLI commands

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::config::TestDefinition;
use crate::Result;

pub mod name;
pub mod render;
pub mod schema;
pub mod spc;

/// Test definition location shared by commands that read one
#[derive(Args, Debug, Clone)]
pub struct DefinitionArgs {
    /// Path to the test definition YAML
    #[arg(short, long, env = "MULTISTAGE_CONFIG")]
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,
}

impl DefinitionArgs {
    pub fn load(&self) -> Result<TestDefinition> {
        TestDefinition::load(&self.config)
    }
}

/// Manifest output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// YAML documents separated by `---`
    Yaml,
    /// A JSON `v1` `List`
    Json,
}

/// Serialize `items` as a stream of manifests
pub fn format_manifests<T: Serialize>(items: &[T], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => {
            let mut out = String::new();
            for item in items {
                out.push_str("---\n");
                out.push_str(&serde_yaml::to_string(item)?);
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let list = serde_json::json!({
                "apiVersion": "v1",
                "kind": "List",
                "items": items,
            });
            Ok(serde_json::to_string_pretty(&list)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn items() -> Vec<BTreeMap<&'static str, &'static str>> {
        vec![
            BTreeMap::from([("kind", "Pod"), ("name", "a")]),
            BTreeMap::from([("kind", "Pod"), ("name", "b")]),
        ]
    }

    #[test]
    fn yaml_output_separates_documents() {
        let out = format_manifests(&items(), OutputFormat::Yaml).unwrap();
        assert_eq!(out.matches("---\n").count(), 2);
        assert!(out.contains("name: b"));
    }

    #[test]
    fn json_output_wraps_list() {
        let out = format_manifests(&items(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["kind"], "List");
        assert_eq!(value["items"][1]["name"], "b");
    }

    #[test]
    fn empty_yaml_output_is_empty() {
        let empty: Vec<BTreeMap<&str, &str>> = Vec::new();
        assert_eq!(format_manifests(&empty, OutputFormat::Yaml).unwrap(), "");
    }
}
