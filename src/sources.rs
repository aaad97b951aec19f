//! Built-in pipe sources and the JSON bridge used by the CLI.
//!
//! | JSON input                                   | Rust type  |
//! |----------------------------------------------|------------|
//! | `{"columns": [...], "rows": [[...], ...]}`   | [`Table`]  |
//! | array of objects                             | [`Table`]  |
//! | any other array                              | [`List`]   |
//! | any other object                             | [`Record`] |
//! | integer / float / string / bool / null       | `i64` / `f64` / `String` / `bool` / `()` |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PipeError, PipeResult};
use crate::registry::VerbRegistry;
use crate::value::Data;

/// A list of JSON values.
pub type List = Vec<Value>;

/// A JSON object.
pub type Record = Map<String, Value>;

/// An in-memory table: named columns over rows of JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// An empty table with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table, checking that every row matches the column count.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> PipeResult<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Build a table from objects. Columns appear in first-seen order and
    /// missing cells are `null`.
    pub fn from_records(records: &[Record]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> PipeResult<()> {
        if row.len() != self.columns.len() {
            return Err(anyhow::anyhow!(
                "row has {} values but the table has {} columns",
                row.len(),
                self.columns.len()
            )
            .into());
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// A copy with `name` set to `value` in every row. An existing column
    /// of that name is overwritten in place; otherwise it is appended.
    pub fn with_column(&self, name: &str, value: &Value) -> Table {
        let mut table = self.clone();
        match table.column_index(name) {
            Some(index) => {
                for row in &mut table.rows {
                    row[index] = value.clone();
                }
            }
            None => {
                table.columns.push(name.to_string());
                for row in &mut table.rows {
                    row.push(value.clone());
                }
            }
        }
        table
    }

    /// A copy holding the first `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// A copy holding only `names`, in that order.
    pub fn select(&self, names: &[String]) -> PipeResult<Table> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| anyhow::anyhow!("no column named '{}'", name))
            })
            .collect::<Result<Vec<usize>, _>>()?;

        Ok(Table {
            columns: names.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// One object per row.
    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }
}

/// Enable every built-in source type on `registry`.
pub fn install_sources(registry: &VerbRegistry) {
    registry
        .make_pipesource::<Table>()
        .make_pipesource::<List>()
        .make_pipesource::<Record>()
        .make_pipesource::<String>()
        .make_pipesource::<i64>()
        .make_pipesource::<f64>()
        .make_pipesource::<bool>();
}

/// Convert parsed JSON into the matching built-in source type.
pub fn from_json(value: Value) -> PipeResult<Data> {
    let data = match value {
        Value::Object(map) if is_table_object(&map) => {
            let table: Table = serde_json::from_value(Value::Object(map))?;
            Data::new(Table::from_rows(table.columns, table.rows)?)
        }
        Value::Object(map) => Data::new(map),
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            let records: Vec<Record> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect();
            Data::new(Table::from_records(&records))
        }
        Value::Array(items) => Data::new(items),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Data::new(i),
            None => Data::new(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Data::new(s),
        Value::Bool(b) => Data::new(b),
        Value::Null => Data::new(()),
    };
    Ok(data)
}

fn is_table_object(map: &Record) -> bool {
    map.len() == 2 && map.contains_key("columns") && map.contains_key("rows")
}

/// Convert a built-in value back to JSON.
pub fn to_json(data: &Data) -> PipeResult<Value> {
    if let Some(table) = data.downcast_ref::<Table>() {
        return Ok(serde_json::to_value(table)?);
    }
    if let Some(list) = data.downcast_ref::<List>() {
        return Ok(Value::Array(list.clone()));
    }
    if let Some(record) = data.downcast_ref::<Record>() {
        return Ok(Value::Object(record.clone()));
    }
    if let Some(value) = data.downcast_ref::<Value>() {
        return Ok(value.clone());
    }
    if let Some(s) = data.downcast_ref::<String>() {
        return Ok(Value::String(s.clone()));
    }
    if let Some(i) = data.downcast_ref::<i64>() {
        return Ok(Value::from(*i));
    }
    if let Some(f) = data.downcast_ref::<f64>() {
        return Ok(Value::from(*f));
    }
    if let Some(b) = data.downcast_ref::<bool>() {
        return Ok(Value::Bool(*b));
    }
    if data.is::<()>() {
        return Ok(Value::Null);
    }
    Err(PipeError::invalid_usage(format!(
        "no JSON form for values of type {}",
        data.type_name()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Table {
        Table::from_rows(
            ["id", "name"],
            vec![vec![json!(1), json!("a")], vec![json!(2), json!("b")]],
        )
        .unwrap()
    }

    #[test]
    fn test_row_width_is_checked() {
        let err = Table::from_rows(["id"], vec![vec![json!(1), json!(2)]]).unwrap_err();
        assert_eq!(err.to_string(), "row has 2 values but the table has 1 columns");
    }

    #[test]
    fn test_with_column_copies() {
        let table = sample();
        let out = table.with_column("flag", &json!(true));

        assert_eq!(out.columns(), &["id", "name", "flag"]);
        assert_eq!(out.column("flag").unwrap(), vec![&json!(true), &json!(true)]);
        assert_eq!(table, sample());

        let out = table.with_column("name", &json!("z"));
        assert_eq!(out.columns(), &["id", "name"]);
        assert_eq!(out.column("name").unwrap(), vec![&json!("z"), &json!("z")]);
    }

    #[test]
    fn test_select_and_head() {
        let table = sample();
        let out = table.select(&["name".to_string()]).unwrap();
        assert_eq!(out.rows(), &[vec![json!("a")], vec![json!("b")]]);

        let err = table.select(&["price".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "no column named 'price'");

        assert_eq!(table.head(1).len(), 1);
        assert_eq!(table.head(10), table);
    }

    #[test]
    fn test_records_round_trip_fills_gaps() {
        let records: Vec<Record> = serde_json::from_value(json!([
            {"id": 1, "name": "a"},
            {"id": 2, "extra": true}
        ]))
        .unwrap();
        let table = Table::from_records(&records);
        assert_eq!(table.columns(), &["id", "name", "extra"]);
        assert_eq!(table.rows()[1], vec![json!(2), Value::Null, json!(true)]);
        assert_eq!(table.to_records()[0].get("name"), Some(&json!("a")));
    }

    #[test]
    fn test_from_json_picks_types() {
        assert!(from_json(json!({"columns": ["a"], "rows": [[1]]})).unwrap().is::<Table>());
        assert!(from_json(json!([{"a": 1}])).unwrap().is::<Table>());
        assert!(from_json(json!([1, 2])).unwrap().is::<List>());
        assert!(from_json(json!([])).unwrap().is::<List>());
        assert!(from_json(json!({"a": 1})).unwrap().is::<Record>());
        assert!(from_json(json!(3)).unwrap().is::<i64>());
        assert!(from_json(json!(3.5)).unwrap().is::<f64>());
        assert!(from_json(json!("s")).unwrap().is::<String>());
        assert!(from_json(json!(null)).unwrap().is::<()>());

        assert!(from_json(json!({"columns": ["a"], "rows": [[1, 2]]})).is_err());
    }

    #[test]
    fn test_to_json() {
        let value = json!({"columns": ["a"], "rows": [[1]]});
        let data = from_json(value.clone()).unwrap();
        assert_eq!(to_json(&data).unwrap(), value);
        assert_eq!(to_json(&Data::new(7i64)).unwrap(), json!(7));

        struct Opaque;
        assert!(to_json(&Data::new(Opaque)).is_err());
    }

    #[test]
    fn test_install_sources() {
        let registry = VerbRegistry::new();
        install_sources(&registry);
        assert!(registry.is_pipesource(Data::new(sample()).type_tag()));
        assert!(registry.is_pipesource(Data::new(1i64).type_tag()));
        assert!(!registry.is_pipesource(Data::new(()).type_tag()));
    }
}
