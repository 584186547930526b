//! Row queries in the shape PostgREST understands.

use serde_json::Value;
use std::cmp::Ordering;

/// Table names used by the application.
pub mod tables {
    pub const ENTRIES: &str = "donut_entries";
    pub const GROUPS: &str = "groups";
    pub const MEMBERS: &str = "group_members";
}

/// A row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { column: String, value: String },
    In { column: String, values: Vec<String> },
}

impl Filter {
    fn column(&self) -> &str {
        match self {
            Self::Eq { column, .. } | Self::In { column, .. } => column,
        }
    }

    /// Render as a PostgREST operator expression, e.g. `eq.abc`.
    fn operator(&self) -> String {
        match self {
            Self::Eq { value, .. } => format!("eq.{value}"),
            Self::In { values, .. } => {
                let quoted: Vec<String> = values
                    .iter()
                    .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
                    .collect();
                format!("in.({})", quoted.join(","))
            }
        }
    }

    /// Whether a JSON row passes this filter.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(cell) = row.get(self.column()) else {
            return false;
        };
        let Some(cell) = scalar_text(cell) else {
            return false;
        };
        match self {
            Self::Eq { value, .. } => &cell == value,
            Self::In { values, .. } => values.iter().any(|v| v == &cell),
        }
    }
}

/// Sort order on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A select / update / delete query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub columns: Option<String>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the returned columns (`select=...`).
    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter::Eq {
            column: column.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn is_in<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.filters.push(Filter::In {
            column: column.to_string(),
            values: values.into_iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string parameters for the PostgREST endpoint.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(columns) = &self.columns {
            params.push(("select".to_string(), columns.clone()));
        }
        for filter in &self.filters {
            params.push((filter.column().to_string(), filter.operator()));
        }
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{direction}", order.column)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }

    /// Whether a row passes every filter.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Keep only the projected columns of a row.
    pub fn project(&self, row: &Value) -> Value {
        let Some(columns) = self.columns.as_deref() else {
            return row.clone();
        };
        if columns.trim() == "*" {
            return row.clone();
        }
        let Value::Object(map) = row else {
            return row.clone();
        };

        let projected = columns
            .split(',')
            .map(str::trim)
            .filter_map(|c| map.get(c).map(|v| (c.to_string(), v.clone())))
            .collect();
        Value::Object(projected)
    }

    /// Compare two rows by this query's ordering column.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let Some(order) = &self.order else {
            return Ordering::Equal;
        };
        let ord = compare_cells(a.get(&order.column), b.get(&order.column));
        if order.ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        // Nulls sort last ascending, like Postgres.
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_postgrest_params() {
        let query = Query::new()
            .columns("*")
            .eq("visibility", "group")
            .eq("group_id", "g1")
            .order("date", false)
            .limit(200);

        assert_eq!(
            query.to_params(),
            vec![
                ("select".to_string(), "*".to_string()),
                ("visibility".to_string(), "eq.group".to_string()),
                ("group_id".to_string(), "eq.g1".to_string()),
                ("order".to_string(), "date.desc".to_string()),
                ("limit".to_string(), "200".to_string()),
            ]
        );
    }

    #[test]
    fn renders_in_filter_quoted() {
        let query = Query::new().is_in("id", ["a", "b"]);
        assert_eq!(
            query.to_params(),
            vec![("id".to_string(), "in.(\"a\",\"b\")".to_string())]
        );
    }

    #[test]
    fn matches_and_projects_rows() {
        let row = json!({"id": "g1", "name": "Levi", "join_code": "ABC234"});
        let query = Query::new().columns("id, name").eq("join_code", "ABC234");

        assert!(query.matches(&row));
        assert!(!Query::new().eq("join_code", "ZZZ999").matches(&row));
        assert!(!Query::new().eq("missing", "x").matches(&row));
        assert_eq!(query.project(&row), json!({"id": "g1", "name": "Levi"}));
    }

    #[test]
    fn compares_by_order_column() {
        let older = json!({"date": "2025-12-01T10:00:00+00:00"});
        let newer = json!({"date": "2025-12-17T10:00:00+00:00"});
        let desc = Query::new().order("date", false);
        assert_eq!(desc.compare(&newer, &older), Ordering::Less);

        let asc = Query::new().order("rating", true);
        assert_eq!(
            asc.compare(&json!({"rating": 3}), &json!({"rating": 10})),
            Ordering::Less
        );
        assert_eq!(
            asc.compare(&json!({"rating": null}), &json!({"rating": 1})),
            Ordering::Greater
        );
    }
}
