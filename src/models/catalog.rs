use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetsArgs {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablesArgs {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub dataset: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnsArgs {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub dataset: String,
    #[serde(default)]
    pub table: String,
    /// Kept as text; parsed by the datasource so that bad input is reported.
    #[serde(default)]
    pub is_orderable: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSchemaArgs {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub dataset: String,
    #[serde(default)]
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateQueryArgs {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub location: String,
    pub query: SqlQuery,
    #[serde(rename = "range")]
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsArgs {
    #[serde(default)]
    pub datasource_id: String,
}

/// Raw SQL plus the query-editor fields macros may refer to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlQuery {
    #[serde(default)]
    pub ref_id: String,
    #[serde(default)]
    pub raw_sql: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// One column of a warehouse table; records carry nested fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<TableField>,
}

impl TableField {
    pub fn is_repeated(&self) -> bool {
        self.mode.as_deref().is_some_and(|m| m.eq_ignore_ascii_case("REPEATED"))
    }

    pub fn is_record(&self) -> bool {
        matches!(self.field_type.to_ascii_uppercase().as_str(), "RECORD" | "STRUCT")
    }

    /// Whether the column can appear in ORDER BY
    pub fn is_orderable(&self) -> bool {
        !self.is_repeated()
            && !matches!(
                self.field_type.to_ascii_uppercase().as_str(),
                "RECORD" | "STRUCT" | "GEOGRAPHY" | "JSON"
            )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadataResponse {
    pub schema: Vec<TableField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_rows: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStatistics {
    pub total_bytes_processed: i64,
}

/// Outcome of validating a query; errors in the query itself are data, not failures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateQueryResponse {
    pub is_valid: bool,
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<QueryStatistics>,
}

impl ValidateQueryResponse {
    pub fn valid(statistics: QueryStatistics) -> Self {
        Self {
            is_valid: true,
            is_error: false,
            error: String::new(),
            statistics: Some(statistics),
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            is_error: true,
            error: error.into(),
            statistics: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_query_args_wire_names() {
        let args: ValidateQueryArgs = serde_json::from_value(json!({
            "project": "p",
            "location": "US",
            "query": { "refId": "A", "rawSql": "SELECT 1" },
            "range": { "from": "2024-01-01T00:00:00Z", "to": "2024-01-02T00:00:00Z" }
        }))
        .unwrap();
        assert_eq!(args.query.raw_sql, "SELECT 1");
        assert!(args.time_range.from < args.time_range.to);
    }

    #[test]
    fn test_orderable_fields() {
        let field = |t: &str, mode: Option<&str>| TableField {
            name: "c".to_string(),
            field_type: t.to_string(),
            mode: mode.map(str::to_string),
            description: None,
            fields: vec![],
        };
        assert!(field("STRING", None).is_orderable());
        assert!(field("TIMESTAMP", Some("NULLABLE")).is_orderable());
        assert!(!field("STRING", Some("REPEATED")).is_orderable());
        assert!(!field("RECORD", None).is_orderable());
        assert!(!field("GEOGRAPHY", None).is_orderable());
    }

    #[test]
    fn test_invalid_response_shape() {
        let value = serde_json::to_value(ValidateQueryResponse::invalid("boom")).unwrap();
        assert_eq!(value, json!({ "isValid": false, "isError": true, "error": "boom" }));
    }
}
