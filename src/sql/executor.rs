use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, info, trace};

use super::ast::*;
use super::parser::parse_statement;
use super::planner::{LogicalPlan, Planner, ProjectionItem};
use crate::error::{EngineError, Result};
use crate::storage::catalog::Catalog;
use crate::storage::table::{Row, Table, Value};

/// Rows produced by a SELECT, with their output column names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Values of one output column, top to bottom.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r.values[index]).collect())
    }
}

/// Aligned text table, one line per row, followed by the row count.
impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.values.iter().map(|v| v.to_string()).collect())
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value_width = cells
                    .iter()
                    .map(|row| row.get(i).map(|v| v.chars().count()).unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                name.chars().count().max(value_width)
            })
            .collect();

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(name, &width)| format!("{:width$}", name, width = width))
            .collect();
        writeln!(f, "{}", header.join(" | "))?;

        let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
        writeln!(f, "{}", sep.join("-+-"))?;

        for row in &cells {
            let values: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(v, &width)| format!("{:width$}", v, width = width))
                .collect();
            writeln!(f, "{}", values.join(" | "))?;
        }

        write!(f, "({} rows)", self.rows.len())
    }
}

/// Outcome of one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows(ResultSet),
    Inserted(usize),
    Updated(usize),
    Deleted(usize),
    TableCreated(String),
    TableDropped(String),
}

impl QueryResult {
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            QueryResult::Rows(rs) => Some(rs),
            _ => None,
        }
    }

    pub fn into_rows(self) -> Option<ResultSet> {
        match self {
            QueryResult::Rows(rs) => Some(rs),
            _ => None,
        }
    }

    /// Number of rows returned or touched; 0 for DDL.
    pub fn affected_rows(&self) -> usize {
        match self {
            QueryResult::Rows(rs) => rs.row_count(),
            QueryResult::Inserted(n) | QueryResult::Updated(n) | QueryResult::Deleted(n) => *n,
            QueryResult::TableCreated(_) | QueryResult::TableDropped(_) => 0,
        }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(rs) => write!(f, "{}", rs),
            QueryResult::Inserted(n) => write!(f, "{} row(s) inserted.", n),
            QueryResult::Updated(n) => write!(f, "{} row(s) updated.", n),
            QueryResult::Deleted(n) => write!(f, "{} row(s) deleted.", n),
            QueryResult::TableCreated(name) => write!(f, "Table '{}' created successfully.", name),
            QueryResult::TableDropped(name) => write!(f, "Table '{}' dropped successfully.", name),
        }
    }
}

/// A column visible to expressions: reachable by `[table.]name`, or, for
/// grouped relations, by the [`Expr::key`] of the expression that produced it.
#[derive(Debug, Clone)]
struct Binding {
    table: Option<String>,
    name: Option<String>,
    key: Option<String>,
}

impl Binding {
    fn column(table: Option<&str>, name: &str) -> Self {
        Self {
            table: table.map(str::to_string),
            name: Some(name.to_string()),
            key: None,
        }
    }

    fn matches(&self, col: &ColumnRef) -> bool {
        let name_matches = self
            .name
            .as_deref()
            .map_or(false, |n| n.eq_ignore_ascii_case(&col.column));
        let table_matches = match &col.table {
            None => true,
            Some(t) => self
                .table
                .as_deref()
                .map_or(false, |bt| bt.eq_ignore_ascii_case(t)),
        };
        name_matches && table_matches
    }
}

/// Intermediate result flowing between plan nodes.
#[derive(Debug, Clone, Default)]
struct Relation {
    bindings: Vec<Binding>,
    rows: Vec<Row>,
    /// Set on the output of an aggregate: the columns of its input, which
    /// are no longer addressable row by row.
    grouped_from: Option<Vec<Binding>>,
}

impl Relation {
    fn new(bindings: Vec<Binding>) -> Self {
        Self {
            bindings,
            rows: Vec::new(),
            grouped_from: None,
        }
    }

    fn for_table(table: &Table, qualifier: &str) -> Self {
        let bindings = table
            .schema
            .columns
            .iter()
            .map(|c| Binding::column(Some(qualifier), &c.name))
            .collect();
        Self::new(bindings)
    }

    fn resolve(bindings: &[Binding], col: &ColumnRef) -> Result<Option<usize>> {
        let mut found = None;
        for (i, binding) in bindings.iter().enumerate() {
            if binding.matches(col) {
                if found.is_some() {
                    return Err(EngineError::AmbiguousColumn(col.to_string()));
                }
                found = Some(i);
            }
        }
        Ok(found)
    }

    fn key_index(&self, key: &str) -> Option<usize> {
        self.bindings
            .iter()
            .position(|b| b.key.as_deref() == Some(key))
    }

    fn missing_column(&self, col: &ColumnRef) -> EngineError {
        match &self.grouped_from {
            Some(input) if matches!(Self::resolve(input, col), Ok(Some(_))) => {
                EngineError::InvalidOperation(format!(
                    "column '{}' must appear in GROUP BY or be used in an aggregate function",
                    col
                ))
            }
            _ => EngineError::UnknownColumn(col.to_string()),
        }
    }
}

/// Runs parsed statements against a catalog.
pub struct Executor<'a> {
    catalog: &'a mut Catalog,
}

impl<'a> Executor<'a> {
    pub fn new(catalog: &'a mut Catalog) -> Self {
        Self { catalog }
    }

    pub fn execute(&mut self, stmt: &Statement) -> Result<QueryResult> {
        debug!(kind = stmt.kind(), table = stmt.table_name(), "executing statement");

        let result = match stmt {
            Statement::Select(select) => QueryResult::Rows(self.execute_select(select)?),
            Statement::Insert(insert) => QueryResult::Inserted(self.execute_insert(insert)?),
            Statement::Update(update) => QueryResult::Updated(self.execute_update(update)?),
            Statement::Delete(delete) => QueryResult::Deleted(self.execute_delete(delete)?),
            Statement::CreateTable(create) => self.execute_create_table(create)?,
            Statement::DropTable(drop) => self.execute_drop_table(drop)?,
        };

        trace!(rows = result.affected_rows(), "statement finished");
        Ok(result)
    }

    fn execute_create_table(&mut self, stmt: &CreateTableStatement) -> Result<QueryResult> {
        if stmt.if_not_exists && self.catalog.contains(&stmt.name) {
            info!(table = %stmt.name, "table already exists, skipping create");
            return Ok(QueryResult::TableCreated(stmt.name.clone()));
        }

        self.catalog
            .create_table(&stmt.name, stmt.columns.clone(), stmt.constraints.clone())?;
        info!(table = %stmt.name, columns = stmt.columns.len(), "created table");
        Ok(QueryResult::TableCreated(stmt.name.clone()))
    }

    fn execute_drop_table(&mut self, stmt: &DropTableStatement) -> Result<QueryResult> {
        if stmt.if_exists && !self.catalog.contains(&stmt.name) {
            info!(table = %stmt.name, "table does not exist, skipping drop");
            return Ok(QueryResult::TableDropped(stmt.name.clone()));
        }

        let table = self.catalog.drop_table(&stmt.name)?;
        info!(table = %table.name, rows = table.row_count(), "dropped table");
        Ok(QueryResult::TableDropped(table.name))
    }

    fn execute_insert(&mut self, stmt: &InsertStatement) -> Result<usize> {
        let table = self.catalog.table(&stmt.table)?;
        let column_count = table.column_count();

        let positions: Vec<usize> = match &stmt.columns {
            Some(columns) => {
                let mut seen = HashSet::new();
                let mut positions = Vec::with_capacity(columns.len());
                for name in columns {
                    let index = table.column_index(name).ok_or_else(|| {
                        EngineError::UnknownColumn(format!("{}.{}", table.name, name))
                    })?;
                    if !seen.insert(index) {
                        return Err(EngineError::DuplicateColumn(name.clone()));
                    }
                    positions.push(index);
                }
                positions
            }
            None => (0..column_count).collect(),
        };

        // Values are constants: no columns are in scope
        let scope = Relation::default();
        let no_row = Row::new(Vec::new());

        let mut new_rows = Vec::with_capacity(stmt.rows.len());
        for tuple in &stmt.rows {
            if tuple.len() != positions.len() {
                return Err(EngineError::ColumnCountMismatch {
                    expected: positions.len(),
                    found: tuple.len(),
                });
            }

            let mut values = vec![Value::Null; column_count];
            for (expr, &pos) in tuple.iter().zip(&positions) {
                values[pos] = self.evaluate_expr(expr, &scope, &no_row)?;
            }

            let values = table
                .schema
                .columns
                .iter()
                .zip(values)
                .map(|(col, value)| col.coerce(&table.name, value))
                .collect::<Result<Vec<_>>>()?;
            new_rows.push(Row::new(values));
        }

        let candidate: Vec<&Row> = table.iter().chain(new_rows.iter()).collect();
        self.catalog.check_constraints(&stmt.table, &candidate)?;

        let count = new_rows.len();
        self.catalog.table_mut(&stmt.table)?.append_rows(new_rows);
        debug!(table = %stmt.table, rows = count, "inserted rows");
        Ok(count)
    }

    fn execute_update(&mut self, stmt: &UpdateStatement) -> Result<usize> {
        let table = self.catalog.table(&stmt.table)?;
        let scope = Relation::for_table(table, &table.name);

        let mut targets = Vec::with_capacity(stmt.assignments.len());
        for assignment in &stmt.assignments {
            let index = table.column_index(&assignment.column).ok_or_else(|| {
                EngineError::UnknownColumn(format!("{}.{}", table.name, assignment.column))
            })?;
            if targets.iter().any(|(i, _)| *i == index) {
                return Err(EngineError::DuplicateColumn(assignment.column.clone()));
            }
            targets.push((index, &assignment.value));
        }

        let mut replacements: HashMap<usize, Row> = HashMap::new();
        for (pos, row) in table.iter().enumerate() {
            if !self.matches_where(stmt.where_clause.as_ref(), &scope, row)? {
                continue;
            }

            // SET expressions see the old values
            let mut values = row.values.clone();
            for &(index, expr) in &targets {
                let value = self.evaluate_expr(expr, &scope, row)?;
                values[index] = table.schema.columns[index].coerce(&table.name, value)?;
            }
            replacements.insert(pos, Row::new(values));
        }

        let candidate: Vec<&Row> = table
            .iter()
            .enumerate()
            .map(|(pos, row)| replacements.get(&pos).unwrap_or(row))
            .collect();
        self.catalog.check_constraints(&stmt.table, &candidate)?;

        let count = replacements.len();
        let table = self.catalog.table_mut(&stmt.table)?;
        for (pos, row) in replacements {
            table.replace_row(pos, row);
        }
        debug!(table = %stmt.table, rows = count, "updated rows");
        Ok(count)
    }

    fn execute_delete(&mut self, stmt: &DeleteStatement) -> Result<usize> {
        let table = self.catalog.table(&stmt.table)?;
        let scope = Relation::for_table(table, &table.name);

        let mut positions = Vec::new();
        for (pos, row) in table.iter().enumerate() {
            if self.matches_where(stmt.where_clause.as_ref(), &scope, row)? {
                positions.push(pos);
            }
        }

        let doomed: HashSet<usize> = positions.iter().copied().collect();
        let remaining: Vec<&Row> = table
            .iter()
            .enumerate()
            .filter(|(pos, _)| !doomed.contains(pos))
            .map(|(_, row)| row)
            .collect();
        self.catalog.check_constraints(&stmt.table, &remaining)?;

        let count = self.catalog.table_mut(&stmt.table)?.remove_rows(&positions);
        debug!(table = %stmt.table, rows = count, "deleted rows");
        Ok(count)
    }

    fn matches_where(&self, predicate: Option<&Expr>, scope: &Relation, row: &Row) -> Result<bool> {
        match predicate {
            Some(expr) => {
                if expr.contains_aggregate() {
                    return Err(EngineError::InvalidOperation(
                        "aggregate functions are not allowed in WHERE".to_string(),
                    ));
                }
                self.is_true(expr, scope, row)
            }
            None => Ok(true),
        }
    }

    fn execute_select(&self, stmt: &SelectStatement) -> Result<ResultSet> {
        let plan = Planner::new(self.catalog).plan(stmt)?;
        let relation = self.execute_plan(&plan)?;

        let columns = relation
            .bindings
            .into_iter()
            .map(|b| b.name.unwrap_or_default())
            .collect();
        Ok(ResultSet {
            columns,
            rows: relation.rows,
        })
    }

    fn execute_plan(&self, plan: &LogicalPlan) -> Result<Relation> {
        match plan {
            LogicalPlan::TableScan { table_name, alias } => {
                self.execute_table_scan(table_name, alias.as_deref())
            }
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => self.execute_join(left, right, *join_type, condition),
            LogicalPlan::Filter { input, predicate } => self.execute_filter(input, predicate),
            LogicalPlan::Aggregate {
                input,
                group_by,
                aggregates,
            } => self.execute_aggregate(input, group_by, aggregates),
            LogicalPlan::Sort { input, order_by } => self.execute_sort(input, order_by),
            LogicalPlan::Projection {
                input,
                items,
                distinct,
            } => self.execute_projection(input, items, *distinct),
            LogicalPlan::Limit {
                input,
                limit,
                offset,
            } => self.execute_limit(input, *limit, *offset),
        }
    }

    fn execute_table_scan(&self, table_name: &str, alias: Option<&str>) -> Result<Relation> {
        let table = self.catalog.table(table_name)?;
        let mut relation = Relation::for_table(table, alias.unwrap_or(table_name));
        relation.rows = table.rows.clone();
        trace!(table = table_name, rows = relation.rows.len(), "scanned table");
        Ok(relation)
    }

    fn execute_join(
        &self,
        left: &LogicalPlan,
        right: &LogicalPlan,
        join_type: JoinType,
        condition: &Expr,
    ) -> Result<Relation> {
        let left = self.execute_plan(left)?;
        let right = self.execute_plan(right)?;

        let mut bindings = left.bindings;
        bindings.extend(right.bindings);
        let mut result = Relation::new(bindings);

        let mut rows = Vec::new();
        for left_row in &left.rows {
            let mut has_match = false;

            for right_row in &right.rows {
                let mut values = left_row.values.clone();
                values.extend(right_row.values.iter().cloned());
                let combined = Row::new(values);

                if self.is_true(condition, &result, &combined)? {
                    has_match = true;
                    rows.push(combined);
                }
            }

            // Unmatched left rows are padded with NULLs
            if !has_match && join_type == JoinType::Left {
                let mut values = left_row.values.clone();
                values.resize(result.bindings.len(), Value::Null);
                rows.push(Row::new(values));
            }
        }

        result.rows = rows;
        Ok(result)
    }

    fn execute_filter(&self, input: &LogicalPlan, predicate: &Expr) -> Result<Relation> {
        let mut relation = self.execute_plan(input)?;
        let rows = std::mem::take(&mut relation.rows);

        for row in rows {
            if self.is_true(predicate, &relation, &row)? {
                relation.rows.push(row);
            }
        }

        Ok(relation)
    }

    fn execute_aggregate(
        &self,
        input: &LogicalPlan,
        group_by: &[Expr],
        aggregates: &[Expr],
    ) -> Result<Relation> {
        let input = self.execute_plan(input)?;

        // Groups in order of first appearance
        let mut groups: Vec<(Vec<Value>, Vec<&Row>)> = Vec::new();
        if group_by.is_empty() {
            groups.push((Vec::new(), input.rows.iter().collect()));
        } else {
            let mut index: HashMap<Vec<String>, usize> = HashMap::new();
            for row in &input.rows {
                let key_values = group_by
                    .iter()
                    .map(|expr| self.evaluate_expr(expr, &input, row))
                    .collect::<Result<Vec<_>>>()?;
                let key: Vec<String> = key_values.iter().map(Value::key).collect();

                let slot = *index.entry(key).or_insert_with(|| {
                    groups.push((key_values, Vec::new()));
                    groups.len() - 1
                });
                groups[slot].1.push(row);
            }
        }

        let mut bindings = Vec::with_capacity(group_by.len() + aggregates.len());
        for expr in group_by {
            let mut binding = match expr {
                Expr::Column(col) => match Relation::resolve(&input.bindings, col)? {
                    Some(i) => input.bindings[i].clone(),
                    None => return Err(EngineError::UnknownColumn(col.to_string())),
                },
                _ => Binding {
                    table: None,
                    name: None,
                    key: None,
                },
            };
            binding.key = Some(expr.key());
            bindings.push(binding);
        }
        for expr in aggregates {
            bindings.push(Binding {
                table: None,
                name: None,
                key: Some(expr.key()),
            });
        }

        let mut rows = Vec::with_capacity(groups.len());
        for (mut values, members) in groups {
            for expr in aggregates {
                values.push(self.compute_aggregate(expr, &input, &members)?);
            }
            rows.push(Row::new(values));
        }

        trace!(groups = rows.len(), "aggregated rows");
        Ok(Relation {
            bindings,
            rows,
            grouped_from: Some(input.bindings),
        })
    }

    fn compute_aggregate(&self, expr: &Expr, input: &Relation, rows: &[&Row]) -> Result<Value> {
        let Expr::Function {
            name,
            args,
            distinct,
        } = expr
        else {
            return Err(EngineError::InvalidOperation(format!(
                "{} is not an aggregate",
                expr
            )));
        };
        let func_name = name.to_uppercase();

        let arg = match args {
            FunctionArgs::Wildcard if func_name == "COUNT" && !distinct => {
                return Ok(Value::Integer(rows.len() as i64));
            }
            FunctionArgs::Wildcard => {
                return Err(EngineError::InvalidOperation(format!(
                    "{} does not accept *",
                    expr
                )))
            }
            FunctionArgs::List(list) if list.len() == 1 => &list[0],
            FunctionArgs::List(list) => {
                return Err(EngineError::InvalidOperation(format!(
                    "{} expects 1 argument, got {}",
                    func_name,
                    list.len()
                )))
            }
        };

        let mut values = Vec::with_capacity(rows.len());
        let mut seen = HashSet::new();
        for row in rows {
            let value = self.evaluate_expr(arg, input, row)?;
            if value.is_null() || (*distinct && !seen.insert(value.key())) {
                continue;
            }
            values.push(value);
        }

        match func_name.as_str() {
            "COUNT" => Ok(Value::Integer(values.len() as i64)),
            "SUM" => sum_values(&values),
            "AVG" => {
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                let total = values
                    .iter()
                    .map(|v| numeric(v, "AVG"))
                    .sum::<Result<f64>>()?;
                finite_float(total / values.len() as f64, "AVG")
            }
            "MIN" => extreme(values, Ordering::Less),
            "MAX" => extreme(values, Ordering::Greater),
            _ => Err(EngineError::UnknownFunction(name.clone())),
        }
    }

    fn execute_sort(&self, input: &LogicalPlan, order_by: &[OrderByItem]) -> Result<Relation> {
        let mut relation = self.execute_plan(input)?;
        let rows = std::mem::take(&mut relation.rows);

        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let keys = order_by
                .iter()
                .map(|item| self.evaluate_expr(&item.expr, &relation, &row))
                .collect::<Result<Vec<_>>>()?;
            keyed.push((keys, row));
        }

        // Stable; NULL sorts lowest, so it comes first ascending, last descending
        keyed.sort_by(|(a, _), (b, _)| {
            for (item, (va, vb)) in order_by.iter().zip(a.iter().zip(b)) {
                let cmp = va.sort_cmp(vb);
                let cmp = if item.ascending { cmp } else { cmp.reverse() };
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            Ordering::Equal
        });

        relation.rows = keyed.into_iter().map(|(_, row)| row).collect();
        Ok(relation)
    }

    fn execute_projection(
        &self,
        input: &LogicalPlan,
        items: &[ProjectionItem],
        distinct: bool,
    ) -> Result<Relation> {
        let input = self.execute_plan(input)?;

        let mut rows = Vec::with_capacity(input.rows.len());
        let mut seen = HashSet::new();
        for row in &input.rows {
            let values = items
                .iter()
                .map(|item| self.evaluate_expr(&item.expr, &input, row))
                .collect::<Result<Vec<_>>>()?;

            if distinct {
                let key: Vec<String> = values.iter().map(Value::key).collect();
                if !seen.insert(key) {
                    continue;
                }
            }
            rows.push(Row::new(values));
        }

        let bindings = items
            .iter()
            .map(|item| Binding::column(None, &item.name))
            .collect();
        let mut relation = Relation::new(bindings);
        relation.rows = rows;
        Ok(relation)
    }

    fn execute_limit(&self, input: &LogicalPlan, limit: Option<u64>, offset: u64) -> Result<Relation> {
        let mut relation = self.execute_plan(input)?;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        relation.rows = std::mem::take(&mut relation.rows)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect();
        Ok(relation)
    }

    /// Predicate test: only TRUE keeps a row; NULL and FALSE drop it.
    fn is_true(&self, expr: &Expr, relation: &Relation, row: &Row) -> Result<bool> {
        match self.evaluate_expr(expr, relation, row)? {
            Value::Boolean(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(EngineError::TypeMismatch(format!(
                "condition must be boolean, got {} ({})",
                other.type_name(),
                other
            ))),
        }
    }

    fn evaluate_expr(&self, expr: &Expr, relation: &Relation, row: &Row) -> Result<Value> {
        // Aggregated relations expose computed columns by expression key
        if relation.grouped_from.is_some() && !matches!(expr, Expr::Literal(_)) {
            if let Some(i) = relation.key_index(&expr.key()) {
                return Ok(row.values[i].clone());
            }
        }

        match expr {
            Expr::Literal(value) => Ok(value.clone()),

            Expr::Column(col) => match Relation::resolve(&relation.bindings, col)? {
                Some(i) => Ok(row.values[i].clone()),
                None => Err(relation.missing_column(col)),
            },

            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And => {
                    let l = as_bool(&self.evaluate_expr(left, relation, row)?, "AND")?;
                    if l == Some(false) {
                        return Ok(Value::Boolean(false));
                    }
                    let r = as_bool(&self.evaluate_expr(right, relation, row)?, "AND")?;
                    Ok(match (l, r) {
                        (_, Some(false)) => Value::Boolean(false),
                        (Some(true), Some(true)) => Value::Boolean(true),
                        _ => Value::Null,
                    })
                }
                BinaryOperator::Or => {
                    let l = as_bool(&self.evaluate_expr(left, relation, row)?, "OR")?;
                    if l == Some(true) {
                        return Ok(Value::Boolean(true));
                    }
                    let r = as_bool(&self.evaluate_expr(right, relation, row)?, "OR")?;
                    Ok(match (l, r) {
                        (_, Some(true)) => Value::Boolean(true),
                        (Some(false), Some(false)) => Value::Boolean(false),
                        _ => Value::Null,
                    })
                }
                _ => {
                    let l = self.evaluate_expr(left, relation, row)?;
                    let r = self.evaluate_expr(right, relation, row)?;
                    apply_binary_op(*op, &l, &r)
                }
            },

            Expr::UnaryOp { op, expr } => {
                let value = self.evaluate_expr(expr, relation, row)?;
                apply_unary_op(*op, value)
            }

            Expr::Function { name, args, distinct } => {
                if expr.is_aggregate() {
                    return Err(EngineError::InvalidOperation(format!(
                        "aggregate function {} is not allowed here",
                        expr
                    )));
                }
                let args = match args {
                    FunctionArgs::List(list) if !distinct => list
                        .iter()
                        .map(|arg| self.evaluate_expr(arg, relation, row))
                        .collect::<Result<Vec<_>>>()?,
                    _ => {
                        return Err(EngineError::InvalidOperation(format!(
                            "{} is not an aggregate function",
                            name.to_uppercase()
                        )))
                    }
                };
                call_scalar(name, args)
            }

            Expr::IsNull { expr, negated } => {
                let value = self.evaluate_expr(expr, relation, row)?;
                Ok(Value::Boolean(value.is_null() != *negated))
            }

            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let value = self.evaluate_expr(expr, relation, row)?;
                if value.is_null() {
                    return Ok(Value::Null);
                }

                let mut saw_null = false;
                for item in list {
                    let candidate = self.evaluate_expr(item, relation, row)?;
                    match compare(&value, &candidate)? {
                        Some(Ordering::Equal) => return Ok(Value::Boolean(!negated)),
                        Some(_) => {}
                        None => saw_null = true,
                    }
                }

                if saw_null {
                    Ok(Value::Null)
                } else {
                    Ok(Value::Boolean(*negated))
                }
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = self.evaluate_expr(expr, relation, row)?;
                let low = self.evaluate_expr(low, relation, row)?;
                let high = self.evaluate_expr(high, relation, row)?;

                let above = compare(&value, &low)?.map(|o| o != Ordering::Less);
                let below = compare(&value, &high)?.map(|o| o != Ordering::Greater);
                let inside = match (above, below) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                };

                Ok(match inside {
                    Some(b) => Value::Boolean(b != *negated),
                    None => Value::Null,
                })
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let value = self.evaluate_expr(expr, relation, row)?;
                let pattern = self.evaluate_expr(pattern, relation, row)?;
                match (&value, &pattern) {
                    (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                    (Value::Text(text), Value::Text(pattern)) => {
                        let text: Vec<char> = text.chars().collect();
                        let pattern: Vec<char> = pattern.chars().collect();
                        Ok(Value::Boolean(like_match(&text, &pattern) != *negated))
                    }
                    _ => Err(EngineError::TypeMismatch(format!(
                        "LIKE requires text operands, got {} and {}",
                        value.type_name(),
                        pattern.type_name()
                    ))),
                }
            }
        }
    }
}

/// Parses and executes one statement against `catalog`.
pub fn run_statement(sql: &str, catalog: &mut Catalog) -> Result<QueryResult> {
    let stmt = parse_statement(sql)?;
    Executor::new(catalog).execute(&stmt)
}

fn as_bool(value: &Value, op: &str) -> Result<Option<bool>> {
    match value {
        Value::Boolean(b) => Ok(Some(*b)),
        Value::Null => Ok(None),
        other => Err(EngineError::TypeMismatch(format!(
            "{} requires boolean operands, got {}",
            op,
            other.type_name()
        ))),
    }
}

/// Three-valued comparison: `None` when either side is NULL.
fn compare(left: &Value, right: &Value) -> Result<Option<Ordering>> {
    if left.is_null() || right.is_null() {
        return Ok(None);
    }
    left.sql_cmp(right).map(Some).ok_or_else(|| {
        EngineError::TypeMismatch(format!(
            "cannot compare {} with {}",
            left.type_name(),
            right.type_name()
        ))
    })
}

fn apply_binary_op(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    if op.is_comparison() {
        let ordering = match compare(left, right)? {
            Some(o) => o,
            None => return Ok(Value::Null),
        };
        let result = match op {
            BinaryOperator::Eq => ordering == Ordering::Equal,
            BinaryOperator::NotEq => ordering != Ordering::Equal,
            BinaryOperator::Lt => ordering == Ordering::Less,
            BinaryOperator::LtEq => ordering != Ordering::Greater,
            BinaryOperator::Gt => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        };
        return Ok(Value::Boolean(result));
    }

    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    match (op, left, right) {
        (BinaryOperator::Concat, l, r) => Ok(Value::Text(format!("{}{}", l, r))),
        (_, Value::Integer(a), Value::Integer(b)) => integer_op(op, *a, *b),
        (_, l, r) => match (l.as_float(), r.as_float()) {
            (Some(a), Some(b)) => float_op(op, a, b),
            _ => Err(EngineError::TypeMismatch(format!(
                "cannot apply {} to {} and {}",
                op.symbol(),
                l.type_name(),
                r.type_name()
            ))),
        },
    }
}

fn integer_op(op: BinaryOperator, a: i64, b: i64) -> Result<Value> {
    if b == 0 && matches!(op, BinaryOperator::Divide | BinaryOperator::Modulo) {
        return Err(EngineError::DivisionByZero);
    }

    let result = match op {
        BinaryOperator::Add => a.checked_add(b),
        BinaryOperator::Subtract => a.checked_sub(b),
        BinaryOperator::Multiply => a.checked_mul(b),
        BinaryOperator::Divide => a.checked_div(b),
        BinaryOperator::Modulo => a.checked_rem(b),
        _ => return Err(not_arithmetic(op)),
    };

    result.map(Value::Integer).ok_or_else(|| {
        EngineError::InvalidOperation(format!("integer overflow in {} {} {}", a, op.symbol(), b))
    })
}

fn float_op(op: BinaryOperator, a: f64, b: f64) -> Result<Value> {
    let result = match op {
        BinaryOperator::Add => a + b,
        BinaryOperator::Subtract => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide | BinaryOperator::Modulo if b == 0.0 => {
            return Err(EngineError::DivisionByZero)
        }
        BinaryOperator::Divide => a / b,
        BinaryOperator::Modulo => a % b,
        _ => return Err(not_arithmetic(op)),
    };
    finite_float(result, op.symbol())
}

/// Floats stay finite: overflow is an error like integer overflow.
fn finite_float(value: f64, context: &str) -> Result<Value> {
    if value.is_finite() {
        Ok(Value::Float(value))
    } else {
        Err(EngineError::InvalidOperation(format!(
            "float overflow in {}",
            context
        )))
    }
}

fn not_arithmetic(op: BinaryOperator) -> EngineError {
    EngineError::InvalidOperation(format!("{} is not an arithmetic operator", op.symbol()))
}

fn apply_unary_op(op: UnaryOperator, value: Value) -> Result<Value> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOperator::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOperator::Minus, Value::Integer(i)) => i
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| EngineError::InvalidOperation(format!("integer overflow in -{}", i))),
        (UnaryOperator::Minus, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOperator::Plus, v @ (Value::Integer(_) | Value::Float(_))) => Ok(v),
        (UnaryOperator::Not, other) => Err(EngineError::TypeMismatch(format!(
            "NOT requires a boolean operand, got {}",
            other.type_name()
        ))),
        (_, other) => Err(EngineError::TypeMismatch(format!(
            "unary minus/plus requires a number, got {}",
            other.type_name()
        ))),
    }
}

fn call_scalar(name: &str, args: Vec<Value>) -> Result<Value> {
    let func_name = name.to_uppercase();

    if func_name == "COALESCE" {
        if args.is_empty() {
            return Err(EngineError::InvalidOperation(
                "COALESCE expects at least 1 argument".to_string(),
            ));
        }
        return Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null));
    }

    if !matches!(func_name.as_str(), "UPPER" | "LOWER" | "LENGTH" | "ABS") {
        return Err(EngineError::UnknownFunction(name.to_string()));
    }
    let [arg]: [Value; 1] = args.try_into().map_err(|args: Vec<Value>| {
        EngineError::InvalidOperation(format!(
            "{} expects 1 argument, got {}",
            func_name,
            args.len()
        ))
    })?;

    match (func_name.as_str(), arg) {
        (_, Value::Null) => Ok(Value::Null),
        ("UPPER", Value::Text(s)) => Ok(Value::Text(s.to_uppercase())),
        ("LOWER", Value::Text(s)) => Ok(Value::Text(s.to_lowercase())),
        ("LENGTH", Value::Text(s)) => Ok(Value::Integer(s.chars().count() as i64)),
        ("ABS", Value::Integer(i)) => i
            .checked_abs()
            .map(Value::Integer)
            .ok_or_else(|| EngineError::InvalidOperation(format!("integer overflow in ABS({})", i))),
        ("ABS", Value::Float(f)) => Ok(Value::Float(f.abs())),
        (func, other) => Err(EngineError::TypeMismatch(format!(
            "{} does not accept {}",
            func,
            other.type_name()
        ))),
    }
}

fn numeric(value: &Value, func: &str) -> Result<f64> {
    value.as_float().ok_or_else(|| {
        EngineError::TypeMismatch(format!("{} requires numbers, got {}", func, value.type_name()))
    })
}

/// Integer when every input is an integer, otherwise float.
fn sum_values(values: &[Value]) -> Result<Value> {
    if values.is_empty() {
        return Ok(Value::Null);
    }

    if values.iter().all(|v| matches!(v, Value::Integer(_))) {
        let mut total: i64 = 0;
        for value in values {
            if let Value::Integer(i) = value {
                total = total.checked_add(*i).ok_or_else(|| {
                    EngineError::InvalidOperation("integer overflow in SUM".to_string())
                })?;
            }
        }
        return Ok(Value::Integer(total));
    }

    let total = values
        .iter()
        .map(|v| numeric(v, "SUM"))
        .sum::<Result<f64>>()?;
    finite_float(total, "SUM")
}

/// MIN (`Less`) or MAX (`Greater`) of non-null values.
fn extreme(values: Vec<Value>, wanted: Ordering) -> Result<Value> {
    let mut best: Option<Value> = None;
    for value in values {
        best = match best {
            None => Some(value),
            Some(current) => match compare(&value, &current)? {
                Some(o) if o == wanted => Some(value),
                _ => Some(current),
            },
        };
    }
    Ok(best.unwrap_or(Value::Null))
}

/// SQL LIKE: `%` matches any run of characters, `_` exactly one.
///
/// Greedy matching that only backtracks to the most recent `%`, which keeps
/// it linear in text times pattern.
fn like_match(text: &[char], pattern: &[char]) -> bool {
    let (mut t, mut p) = (0, 0);
    // Position of the last `%` and the text position it currently absorbs up to
    let mut resume: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                resume = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '_' || c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match resume {
                Some((star, absorbed)) => {
                    p = star + 1;
                    t = absorbed + 1;
                    resume = Some((star, t));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        let script = [
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)",
            "INSERT INTO users VALUES (1, 'Alice', 30), (2, 'Bob', 25), (3, 'Charlie', 35)",
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users (id), amount FLOAT)",
            "INSERT INTO orders VALUES (1, 1, 100.0), (2, 1, 200.0), (3, 2, 150.0)",
        ];
        for sql in script {
            run_statement(sql, &mut catalog).unwrap();
        }
        catalog
    }

    fn query(catalog: &mut Catalog, sql: &str) -> ResultSet {
        run_statement(sql, catalog).unwrap().into_rows().unwrap()
    }

    fn column(rs: &ResultSet, name: &str) -> Vec<Value> {
        rs.column_values(name).unwrap().into_iter().cloned().collect()
    }

    #[test]
    fn test_simple_select() {
        let mut catalog = create_test_catalog();
        let result = query(&mut catalog, "SELECT * FROM users");
        assert_eq!(result.row_count(), 3);
        assert_eq!(result.columns, vec!["id", "name", "age"]);
    }

    #[test]
    fn test_where_clause() {
        let mut catalog = create_test_catalog();
        let result = query(&mut catalog, "SELECT name FROM users WHERE age > 28");
        assert_eq!(
            column(&result, "name"),
            vec![Value::Text("Alice".into()), Value::Text("Charlie".into())]
        );
    }

    #[test]
    fn test_order_by_desc_with_limit() {
        let mut catalog = create_test_catalog();
        let result = query(&mut catalog, "SELECT name FROM users ORDER BY age DESC LIMIT 2");
        assert_eq!(
            column(&result, "name"),
            vec![Value::Text("Charlie".into()), Value::Text("Alice".into())]
        );
    }

    #[test]
    fn test_count_and_sum() {
        let mut catalog = create_test_catalog();
        let result = query(&mut catalog, "SELECT COUNT(*), SUM(amount), SUM(id) FROM orders");
        assert_eq!(result.columns, vec!["count", "sum", "sum"]);
        assert_eq!(
            result.rows[0].values,
            vec![Value::Integer(3), Value::Float(450.0), Value::Integer(6)]
        );
    }

    #[test]
    fn test_aggregates_over_empty_input() {
        let mut catalog = create_test_catalog();
        let result = query(
            &mut catalog,
            "SELECT COUNT(*), SUM(amount), AVG(amount), MAX(amount) FROM orders WHERE amount > 1000",
        );
        assert_eq!(
            result.rows,
            vec![Row::new(vec![
                Value::Integer(0),
                Value::Null,
                Value::Null,
                Value::Null
            ])]
        );
    }

    #[test]
    fn test_group_by_first_appearance_order() {
        let mut catalog = create_test_catalog();
        let result = query(
            &mut catalog,
            "SELECT user_id, COUNT(*) AS n, AVG(amount) FROM orders GROUP BY user_id",
        );
        assert_eq!(
            result.rows,
            vec![
                Row::new(vec![Value::Integer(1), Value::Integer(2), Value::Float(150.0)]),
                Row::new(vec![Value::Integer(2), Value::Integer(1), Value::Float(150.0)]),
            ]
        );
    }

    #[test]
    fn test_having_and_order_by_aggregate() {
        let mut catalog = create_test_catalog();
        run_statement("INSERT INTO orders VALUES (4, 3, 5.0)", &mut catalog).unwrap();
        let result = query(
            &mut catalog,
            "SELECT user_id FROM orders GROUP BY user_id HAVING COUNT(*) < 2 ORDER BY SUM(amount)",
        );
        assert_eq!(
            column(&result, "user_id"),
            vec![Value::Integer(3), Value::Integer(2)]
        );
    }

    #[test]
    fn test_ungrouped_column_rejected() {
        let mut catalog = create_test_catalog();
        let err = run_statement("SELECT name, COUNT(*) FROM users", &mut catalog).unwrap_err();
        assert!(matches!(err, EngineError::InvalidOperation(_)));

        let err = run_statement("SELECT nope, COUNT(*) FROM users", &mut catalog).unwrap_err();
        assert!(matches!(err, EngineError::UnknownColumn(_)));
    }

    #[test]
    fn test_group_key_ignores_identifier_case() {
        let mut catalog = create_test_catalog();
        let result = query(
            &mut catalog,
            "SELECT AGE + 1 AS next, count(*) FROM users GROUP BY age + 1 HAVING COUNT(*) > 0 ORDER BY Age + 1",
        );
        assert_eq!(result.columns, vec!["next", "count"]);
        assert_eq!(
            column(&result, "next"),
            vec![Value::Integer(26), Value::Integer(31), Value::Integer(36)]
        );
    }

    #[test]
    fn test_float_overflow_is_an_error() {
        let mut catalog = create_test_catalog();
        let big = format!("1{}.0", "0".repeat(300));
        let sql = format!("SELECT amount * {} * {} FROM orders", big, big);
        let err = run_statement(&sql, &mut catalog).unwrap_err();
        assert!(matches!(err, EngineError::InvalidOperation(_)));

        let sql = format!("SELECT amount - amount * {} FROM orders", big);
        assert_eq!(query(&mut catalog, &sql).row_count(), 3);
    }

    #[test]
    fn test_join() {
        let mut catalog = create_test_catalog();
        let result = query(
            &mut catalog,
            "SELECT u.name, o.amount FROM users u JOIN orders o ON u.id = o.user_id ORDER BY o.id",
        );
        assert_eq!(result.row_count(), 3);
        assert_eq!(result.columns, vec!["name", "amount"]);
    }

    #[test]
    fn test_left_join_pads_with_null() {
        let mut catalog = create_test_catalog();
        let result = query(
            &mut catalog,
            "SELECT users.name, orders.amount FROM users LEFT JOIN orders ON users.id = orders.user_id WHERE orders.id IS NULL",
        );
        assert_eq!(
            result.rows,
            vec![Row::new(vec![Value::Text("Charlie".into()), Value::Null])]
        );
    }

    #[test]
    fn test_ambiguous_column() {
        let mut catalog = create_test_catalog();
        let err = run_statement(
            "SELECT id FROM users JOIN orders ON users.id = orders.user_id",
            &mut catalog,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::AmbiguousColumn(_)));
    }

    #[test]
    fn test_like_is_case_sensitive() {
        let mut catalog = create_test_catalog();
        let result = query(&mut catalog, "SELECT name FROM users WHERE name LIKE 'A%'");
        assert_eq!(result.row_count(), 1);
        let result = query(&mut catalog, "SELECT name FROM users WHERE name LIKE 'a%'");
        assert_eq!(result.row_count(), 0);
        let result = query(&mut catalog, "SELECT name FROM users WHERE name LIKE '_ob'");
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn test_in_and_between() {
        let mut catalog = create_test_catalog();
        let result = query(&mut catalog, "SELECT * FROM users WHERE name IN ('Alice', 'Bob')");
        assert_eq!(result.row_count(), 2);
        let result = query(&mut catalog, "SELECT * FROM users WHERE age BETWEEN 25 AND 32");
        assert_eq!(result.row_count(), 2);
        let result = query(&mut catalog, "SELECT * FROM users WHERE age NOT BETWEEN 25 AND 32");
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn test_distinct() {
        let mut catalog = create_test_catalog();
        let result = query(&mut catalog, "SELECT DISTINCT user_id FROM orders");
        assert_eq!(result.row_count(), 2);
    }

    #[test]
    fn test_three_valued_logic() {
        assert_eq!(
            apply_binary_op(BinaryOperator::Eq, &Value::Null, &Value::Integer(1)).unwrap(),
            Value::Null
        );

        let mut catalog = Catalog::new();
        run_statement("CREATE TABLE t (a INT, b BOOLEAN)", &mut catalog).unwrap();
        run_statement("INSERT INTO t VALUES (1, NULL), (2, TRUE)", &mut catalog).unwrap();

        let rs = query(&mut catalog, "SELECT b AND FALSE, b OR TRUE, NOT b, a IN (3, NULL) FROM t");
        assert_eq!(
            rs.rows[0].values,
            vec![
                Value::Boolean(false),
                Value::Boolean(true),
                Value::Null,
                Value::Null
            ]
        );
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            apply_binary_op(BinaryOperator::Divide, &Value::Integer(7), &Value::Integer(2)).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            apply_binary_op(BinaryOperator::Add, &Value::Integer(1), &Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
        assert!(matches!(
            apply_binary_op(BinaryOperator::Modulo, &Value::Integer(1), &Value::Integer(0)),
            Err(EngineError::DivisionByZero)
        ));
        assert!(matches!(
            apply_binary_op(BinaryOperator::Add, &Value::Integer(i64::MAX), &Value::Integer(1)),
            Err(EngineError::InvalidOperation(_))
        ));
        assert!(matches!(
            apply_binary_op(BinaryOperator::Add, &Value::Text("a".into()), &Value::Integer(1)),
            Err(EngineError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_scalar_functions() {
        let mut catalog = create_test_catalog();
        let rs = query(
            &mut catalog,
            "SELECT UPPER(name), LENGTH(name), ABS(-age), COALESCE(NULL, name) FROM users WHERE id = 1",
        );
        assert_eq!(
            rs.rows[0].values,
            vec![
                Value::Text("ALICE".into()),
                Value::Integer(5),
                Value::Integer(30),
                Value::Text("Alice".into())
            ]
        );

        let err = run_statement("SELECT FOO(name) FROM users", &mut catalog).unwrap_err();
        assert!(matches!(err, EngineError::UnknownFunction(_)));
    }

    #[test]
    fn test_update_uses_old_values() {
        let mut catalog = create_test_catalog();
        let result = run_statement("UPDATE users SET age = age + 1, id = id + 10 WHERE age < 35", &mut catalog)
            .unwrap_err();
        // users 1 and 2 are referenced by orders
        assert!(matches!(result, EngineError::ConstraintViolation(_)));

        let result = run_statement("UPDATE users SET age = age * 2 WHERE age < 35", &mut catalog).unwrap();
        assert_eq!(result, QueryResult::Updated(2));
        let rs = query(&mut catalog, "SELECT age FROM users ORDER BY id");
        assert_eq!(
            column(&rs, "age"),
            vec![Value::Integer(60), Value::Integer(50), Value::Integer(35)]
        );
    }

    #[test]
    fn test_update_type_error_leaves_table_unchanged() {
        let mut catalog = create_test_catalog();
        let err = run_statement("UPDATE users SET age = 'old'", &mut catalog).unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch(_)));
        let rs = query(&mut catalog, "SELECT age FROM users WHERE id = 1");
        assert_eq!(column(&rs, "age"), vec![Value::Integer(30)]);
    }

    #[test]
    fn test_delete_respects_foreign_keys() {
        let mut catalog = create_test_catalog();
        let err = run_statement("DELETE FROM users WHERE id = 1", &mut catalog).unwrap_err();
        assert!(matches!(err, EngineError::ConstraintViolation(_)));

        let result = run_statement("DELETE FROM users WHERE id = 3", &mut catalog).unwrap();
        assert_eq!(result, QueryResult::Deleted(1));
        assert_eq!(catalog.table("users").unwrap().row_count(), 2);
    }

    #[test]
    fn test_insert_with_column_list() {
        let mut catalog = create_test_catalog();
        run_statement("INSERT INTO users (name, id) VALUES ('Dana', 4)", &mut catalog).unwrap();
        let rs = query(&mut catalog, "SELECT age FROM users WHERE id = 4");
        assert_eq!(column(&rs, "age"), vec![Value::Null]);

        let err = run_statement("INSERT INTO users (id, nope) VALUES (5, 1)", &mut catalog).unwrap_err();
        assert!(matches!(err, EngineError::UnknownColumn(_)));
        let err = run_statement("INSERT INTO users VALUES (5, 'Eve')", &mut catalog).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ColumnCountMismatch {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn test_multi_row_insert_is_atomic() {
        let mut catalog = create_test_catalog();
        let err = run_statement(
            "INSERT INTO users VALUES (4, 'Dana', 20), (1, 'Dup', 40)",
            &mut catalog,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::ConstraintViolation(_)));
        assert_eq!(catalog.table("users").unwrap().row_count(), 3);
    }

    #[test]
    fn test_query_result_messages() {
        assert_eq!(
            QueryResult::TableCreated("users".into()).to_string(),
            "Table 'users' created successfully."
        );
        assert_eq!(QueryResult::Updated(2).to_string(), "2 row(s) updated.");
    }

    #[test]
    fn test_result_set_display() {
        let rs = ResultSet {
            columns: vec!["id".into(), "name".into()],
            rows: vec![Row::new(vec![Value::Integer(1), Value::Text("Alice".into())])],
        };
        assert_eq!(rs.to_string(), "id | name \n---+------\n1  | Alice\n(1 rows)");
    }

    #[test]
    fn test_like_match() {
        let m = |t: &str, p: &str| {
            like_match(&t.chars().collect::<Vec<_>>(), &p.chars().collect::<Vec<_>>())
        };
        assert!(m("hello", "h%o"));
        assert!(m("hello", "%"));
        assert!(m("", "%"));
        assert!(!m("hello", "h_o"));
        assert!(m("a%b", "a%b"));
        assert!(m("mississippi", "%iss%ppi"));
        assert!(m("abcab", "%ab"));
        assert!(!m("abc", "%ab"));
        assert!(!m("ab", "a__%"));
        assert!(m("xyz", "_%_"));
    }

    #[test]
    fn test_like_with_many_wildcards_is_fast() {
        let mut catalog = create_test_catalog();
        run_statement("CREATE TABLE words (s TEXT)", &mut catalog).unwrap();
        let insert = format!("INSERT INTO words VALUES ('{}')", "a".repeat(40));
        run_statement(&insert, &mut catalog).unwrap();

        let started = std::time::Instant::now();
        let result = query(
            &mut catalog,
            "SELECT COUNT(*) FROM words WHERE s LIKE '%a%a%a%a%a%a%a%b'",
        );
        assert_eq!(result.rows[0].values, vec![Value::Integer(0)]);

        let result = query(
            &mut catalog,
            "SELECT COUNT(*) FROM words WHERE s LIKE '%a%a%a%a%a%a%a%a'",
        );
        assert_eq!(result.rows[0].values, vec![Value::Integer(1)]);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }
}
