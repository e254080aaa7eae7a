// Query macro interpolation
//
// Expands `$__name` / `$__name(args)` placeholders in raw SQL before it is
// sent to the warehouse.

use crate::api::middleware::AppError;
use crate::models::{SqlQuery, TimeRange};

const MACRO_PREFIX: &str = "$__";

/// Expands macros in a query's raw SQL
pub trait MacroInterpolator: Send + Sync {
    fn interpolate(&self, query: &SqlQuery, time_range: &TimeRange) -> Result<String, AppError>;
}

/// `$__timeFilter(column)`, `$__timeFrom()`, `$__timeTo()`, `$__table`, `$__column`
#[derive(Debug, Default, Clone)]
pub struct StandardMacros;

impl StandardMacros {
    fn expand(&self, name: &str, args: &[String], query: &SqlQuery, range: &TimeRange) -> Result<String, AppError> {
        let from = format!("TIMESTAMP_MILLIS({})", range.from.timestamp_millis());
        let to = format!("TIMESTAMP_MILLIS({})", range.to.timestamp_millis());

        match name {
            "timeFilter" => match args {
                [column] if !column.is_empty() => Ok(format!("{} BETWEEN {} AND {}", column, from, to)),
                _ => Err(AppError::Validation(format!(
                    "macro $__timeFilter expects 1 argument, got {}",
                    args.len()
                ))),
            },
            "timeFrom" => Ok(from),
            "timeTo" => Ok(to),
            "table" if query.table.is_empty() => {
                Err(AppError::Validation("macro $__table used but no table is selected".to_string()))
            }
            "table" => Ok(query.table.clone()),
            "column" if query.column.is_empty() => {
                Err(AppError::Validation("macro $__column used but no column is selected".to_string()))
            }
            "column" => Ok(query.column.clone()),
            _ => Err(AppError::Validation(format!("undefined macro: $__{}", name))),
        }
    }
}

impl MacroInterpolator for StandardMacros {
    fn interpolate(&self, query: &SqlQuery, time_range: &TimeRange) -> Result<String, AppError> {
        let sql = query.raw_sql.as_str();
        let mut out = String::with_capacity(sql.len());
        let mut rest = sql;

        while let Some(start) = rest.find(MACRO_PREFIX) {
            out.push_str(&rest[..start]);
            let after = &rest[start + MACRO_PREFIX.len()..];
            let name_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..name_len];
            if name.is_empty() {
                // a lone `$__` is left as it is
                out.push_str(MACRO_PREFIX);
                rest = after;
                continue;
            }

            let mut remainder = &after[name_len..];
            let mut args = Vec::new();
            if remainder.starts_with('(') {
                let close = matching_paren(remainder).ok_or_else(|| {
                    AppError::Validation(format!("missing closing parenthesis for macro $__{}", name))
                })?;
                let inner = remainder[1..close].trim();
                if !inner.is_empty() {
                    args = inner.split(',').map(|a| a.trim().to_string()).collect();
                }
                remainder = &remainder[close + 1..];
            }

            out.push_str(&self.expand(name, &args, query, time_range)?);
            rest = remainder;
        }

        out.push_str(rest);
        Ok(out)
    }
}

/// Byte offset of the `)` closing the `(` at the start of `s`
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn range() -> TimeRange {
        TimeRange {
            from: Utc.timestamp_millis_opt(1_000).unwrap(),
            to: Utc.timestamp_millis_opt(2_000).unwrap(),
        }
    }

    fn query(sql: &str) -> SqlQuery {
        SqlQuery {
            raw_sql: sql.to_string(),
            table: "ds.events".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_time_filter() {
        let sql = StandardMacros
            .interpolate(&query("SELECT * FROM t WHERE $__timeFilter(ts)"), &range())
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE ts BETWEEN TIMESTAMP_MILLIS(1000) AND TIMESTAMP_MILLIS(2000)"
        );
    }

    #[test]
    fn test_table_and_bounds() {
        let sql = StandardMacros
            .interpolate(&query("SELECT $__timeFrom(), $__timeTo FROM $__table"), &range())
            .unwrap();
        assert_eq!(sql, "SELECT TIMESTAMP_MILLIS(1000), TIMESTAMP_MILLIS(2000) FROM ds.events");
    }

    #[test]
    fn test_plain_sql_untouched() {
        let sql = "SELECT price * 2 FROM t WHERE name = '$'";
        assert_eq!(StandardMacros.interpolate(&query(sql), &range()).unwrap(), sql);
    }

    #[test]
    fn test_errors() {
        assert!(StandardMacros.interpolate(&query("SELECT $__nope()"), &range()).is_err());
        assert!(StandardMacros.interpolate(&query("WHERE $__timeFilter()"), &range()).is_err());
        assert!(StandardMacros.interpolate(&query("WHERE $__timeFilter(ts"), &range()).is_err());
        assert!(StandardMacros.interpolate(&query("SELECT $__column"), &range()).is_err());
    }
}
