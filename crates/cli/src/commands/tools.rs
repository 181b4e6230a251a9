//! Tool catalog listing

use anyhow::{bail, Result};
use profiler_lib::catalog::{self, ToolDefinition};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_table, OutputFormat};

/// Row for the catalog table
#[derive(Tabled, Serialize)]
pub struct ToolRow {
    #[tabled(rename = "Tool")]
    pub tool: String,
    #[tabled(rename = "Server")]
    pub server: String,
    #[tabled(rename = "Locality")]
    pub locality: String,
    #[tabled(rename = "Description")]
    pub description: String,
}

impl From<&ToolDefinition> for ToolRow {
    fn from(t: &ToolDefinition) -> Self {
        Self {
            tool: t.name.to_string(),
            server: t.server.to_string(),
            locality: catalog::data_locality(t.server).to_string(),
            description: t.description.to_string(),
        }
    }
}

/// List catalog tools, optionally those of one server
pub fn list_tools(server: Option<String>, format: OutputFormat) -> Result<()> {
    let rows: Vec<ToolRow> = match &server {
        Some(s) => {
            if !catalog::SERVERS.contains(&s.as_str()) {
                bail!("Unknown server '{}'; known: {}", s, catalog::SERVERS.join(", "));
            }
            catalog::tools_for_server(s).map(ToolRow::from).collect()
        }
        None => catalog::all_tools().iter().map(ToolRow::from).collect(),
    };
    print_table(&rows, format);
    Ok(())
}
