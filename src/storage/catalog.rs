use std::collections::{HashMap, HashSet};

use super::table::{ColumnDef, Constraints, Row, Schema, Table};
use crate::error::{EngineError, Result};

/// Registry of every table known to one engine instance.
///
/// Table names are matched case-insensitively. The catalog owns its tables;
/// callers borrow them through [`Catalog::table`] and [`Catalog::table_mut`].
#[derive(Debug, Default)]
pub struct Catalog {
    tables: HashMap<String, Table>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn create_table(
        &mut self,
        name: &str,
        mut columns: Vec<ColumnDef>,
        constraints: Constraints,
    ) -> Result<()> {
        if self.contains(name) {
            return Err(EngineError::DuplicateTable(name.to_string()));
        }
        if columns.is_empty() {
            return Err(EngineError::InvalidOperation(format!(
                "table '{}' must have at least one column",
                name
            )));
        }

        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.to_lowercase()) {
                return Err(EngineError::DuplicateColumn(format!("{}.{}", name, col.name)));
            }
        }

        let key_columns = constraints
            .primary_key
            .iter()
            .chain(constraints.unique.iter().flatten());
        for key in key_columns {
            if !seen.contains(&key.to_lowercase()) {
                return Err(EngineError::UnknownColumn(format!("{}.{}", name, key)));
            }
        }

        // Primary key columns never hold NULL
        for col in columns.iter_mut() {
            if constraints
                .primary_key
                .iter()
                .any(|k| k.eq_ignore_ascii_case(&col.name))
            {
                col.nullable = false;
            }
        }

        let schema = Schema::new(columns);
        for fk in &constraints.foreign_keys {
            let local = schema
                .column(&fk.column)
                .ok_or_else(|| EngineError::UnknownColumn(format!("{}.{}", name, fk.column)))?;

            let target = if fk.ref_table.eq_ignore_ascii_case(name) {
                schema.column(&fk.ref_column)
            } else {
                self.table(&fk.ref_table)?.schema.column(&fk.ref_column)
            };
            let target = target.ok_or_else(|| {
                EngineError::UnknownColumn(format!("{}.{}", fk.ref_table, fk.ref_column))
            })?;

            if local.data_type != target.data_type {
                return Err(EngineError::TypeMismatch(format!(
                    "foreign key {}.{} ({}) references {}.{} ({})",
                    name, fk.column, local.data_type, fk.ref_table, fk.ref_column, target.data_type
                )));
            }
        }

        tracing::debug!(table = name, columns = schema.column_count(), "registering table");
        self.tables
            .insert(name.to_lowercase(), Table::new(name, schema, constraints));
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<Table> {
        let table = self.table(name)?;

        if let Some(referencing) = self.referencing_tables(&table.name).next() {
            return Err(EngineError::ConstraintViolation(format!(
                "cannot drop table '{}': it is referenced by table '{}'",
                table.name, referencing.name
            )));
        }

        self.tables
            .remove(&name.to_lowercase())
            .ok_or_else(|| EngineError::UnknownTable(name.to_string()))
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(&name.to_lowercase())
            .ok_or_else(|| EngineError::UnknownTable(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(&name.to_lowercase())
            .ok_or_else(|| EngineError::UnknownTable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_lowercase())
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.values().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Other tables holding a foreign key into `name`.
    fn referencing_tables<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Table> + 'a {
        self.tables.values().filter(move |t| {
            !t.name.eq_ignore_ascii_case(name)
                && t.constraints
                    .foreign_keys
                    .iter()
                    .any(|fk| fk.ref_table.eq_ignore_ascii_case(name))
        })
    }

    /// Validates the declared constraints of `name` as if `rows` were its full
    /// contents. Nothing is modified.
    pub fn check_constraints(&self, name: &str, rows: &[&Row]) -> Result<()> {
        let table = self.table(name)?;

        if !table.constraints.primary_key.is_empty() {
            check_unique(table, &table.constraints.primary_key, rows, "primary key")?;
        }
        for columns in &table.constraints.unique {
            check_unique(table, columns, rows, "unique key")?;
        }

        for fk in &table.constraints.foreign_keys {
            let local = column_position(table, &fk.column)?;
            let available = if fk.ref_table.eq_ignore_ascii_case(&table.name) {
                key_set(rows.iter().copied(), column_position(table, &fk.ref_column)?)
            } else {
                let target = self.table(&fk.ref_table)?;
                key_set(target.iter(), column_position(target, &fk.ref_column)?)
            };

            for row in rows {
                let value = &row.values[local];
                if !value.is_null() && !available.contains(&value.key()) {
                    return Err(EngineError::ConstraintViolation(format!(
                        "{}.{} = {} has no matching row in {}.{}",
                        table.name, fk.column, value, fk.ref_table, fk.ref_column
                    )));
                }
            }
        }

        for other in self.referencing_tables(&table.name) {
            for fk in other
                .constraints
                .foreign_keys
                .iter()
                .filter(|fk| fk.ref_table.eq_ignore_ascii_case(&table.name))
            {
                let available = key_set(rows.iter().copied(), column_position(table, &fk.ref_column)?);
                let local = column_position(other, &fk.column)?;
                if let Some(orphan) = other
                    .iter()
                    .map(|r| &r.values[local])
                    .find(|v| !v.is_null() && !available.contains(&v.key()))
                {
                    return Err(EngineError::ConstraintViolation(format!(
                        "{}.{} = {} is still referenced by {}.{}",
                        table.name, fk.ref_column, orphan, other.name, fk.column
                    )));
                }
            }
        }

        Ok(())
    }
}

fn column_position(table: &Table, column: &str) -> Result<usize> {
    table
        .column_index(column)
        .ok_or_else(|| EngineError::UnknownColumn(format!("{}.{}", table.name, column)))
}

fn key_set<'a>(rows: impl Iterator<Item = &'a Row>, index: usize) -> HashSet<String> {
    rows.map(|r| &r.values[index])
        .filter(|v| !v.is_null())
        .map(|v| v.key())
        .collect()
}

fn check_unique(table: &Table, columns: &[String], rows: &[&Row], kind: &str) -> Result<()> {
    let positions = columns
        .iter()
        .map(|c| column_position(table, c))
        .collect::<Result<Vec<_>>>()?;

    let mut seen = HashSet::new();
    for row in rows {
        let values: Vec<_> = positions.iter().map(|&i| &row.values[i]).collect();
        // NULLs never collide
        if values.iter().any(|v| v.is_null()) {
            continue;
        }
        let key: Vec<String> = values.iter().map(|v| v.key()).collect();
        if !seen.insert(key) {
            let shown: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            return Err(EngineError::ConstraintViolation(format!(
                "duplicate {} ({}) = ({}) in table '{}'",
                kind,
                columns.join(", "),
                shown.join(", "),
                table.name
            )));
        }
    }
    Ok(())
}
