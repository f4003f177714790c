//! SQL tools exposed to the model
//!
//! Each tool maps to one `Database` operation. Failures are returned to the
//! model as text so it can correct its next call.

use crate::db::Database;
use crate::llm::{ToolCall, ToolDefinition};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Tool: list tables
pub const LIST_TABLES: &str = "sql_db_list_tables";
/// Tool: table schemas with sample rows
pub const SCHEMA: &str = "sql_db_schema";
/// Tool: run a query
pub const QUERY: &str = "sql_db_query";

/// Longest tool result handed back to the model
const MAX_RESULT_CHARS: usize = 8_000;

/// Definitions of all SQL tools
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::function(
            LIST_TABLES,
            "Returns a comma-separated list of the tables in the database.",
            json!({"type": "object", "properties": {}}),
        ),
        ToolDefinition::function(
            SCHEMA,
            "Returns the schema and sample rows for the given tables. Be sure the tables exist by calling sql_db_list_tables first.",
            json!({
                "type": "object",
                "properties": {
                    "table_names": {
                        "type": "string",
                        "description": "Comma-separated list of tables, for example: table1, table2"
                    }
                },
                "required": ["table_names"]
            }),
        ),
        ToolDefinition::function(
            QUERY,
            "Executes a detailed and correct SQL query and returns the result. If the query is not correct, an error message is returned; rewrite the query, check it, and try again. If you get an unknown column error, use sql_db_schema to look up the correct columns.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "A detailed and correct SQL query."}
                },
                "required": ["query"]
            }),
        ),
    ]
}

#[derive(Deserialize)]
struct SchemaArgs {
    table_names: String,
}

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

fn parse_args<'a, T: Deserialize<'a>>(call: &'a ToolCall) -> Result<T, String> {
    let raw = if call.function.arguments.trim().is_empty() {
        "{}"
    } else {
        call.function.arguments.as_str()
    };
    serde_json::from_str(raw).map_err(|e| format!("Error: invalid arguments for {}: {}", call.function.name, e))
}

fn truncate(mut text: String) -> String {
    if text.len() > MAX_RESULT_CHARS {
        let mut cut = MAX_RESULT_CHARS;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("... (truncated)");
    }
    text
}

/// Run one tool call against `db`, returning the text shown to the model
pub async fn dispatch(db: &dyn Database, call: &ToolCall) -> String {
    debug!(tool = %call.function.name, arguments = %call.function.arguments, "Running tool");

    let result = match call.function.name.as_str() {
        LIST_TABLES => db
            .table_names()
            .await
            .map(|names| names.join(", "))
            .map_err(|e| format!("Error: {}", e)),
        SCHEMA => match parse_args::<SchemaArgs>(call) {
            Ok(args) => {
                let tables: Vec<String> = args
                    .table_names
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                db.table_info(&tables)
                    .await
                    .map_err(|e| format!("Error: {}", e))
            }
            Err(e) => Err(e),
        },
        QUERY => match parse_args::<QueryArgs>(call) {
            Ok(args) => db
                .run(&args.query)
                .await
                .map(|result| result.to_text())
                .map_err(|e| format!("Error: {}", e)),
            Err(e) => Err(e),
        },
        other => Err(format!(
            "Error: {} is not a valid tool, try one of [{}, {}, {}].",
            other, LIST_TABLES, SCHEMA, QUERY
        )),
    };

    match result {
        Ok(text) => truncate(text),
        Err(message) => {
            warn!(tool = %call.function.name, error = %message, "Tool call failed");
            message
        }
    }
}
