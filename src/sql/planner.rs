use std::collections::HashSet;

use super::ast::*;
use crate::error::{EngineError, Result};
use crate::storage::catalog::Catalog;
use crate::storage::table::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    // Scan a table
    TableScan {
        table_name: String,
        alias: Option<String>,
    },

    // Nested loop join
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        join_type: JoinType,
        condition: Expr,
    },

    // Filter (WHERE, HAVING)
    Filter {
        input: Box<LogicalPlan>,
        predicate: Expr,
    },

    // Aggregation (GROUP BY)
    Aggregate {
        input: Box<LogicalPlan>,
        group_by: Vec<Expr>,
        aggregates: Vec<Expr>,
    },

    // Sort (ORDER BY)
    Sort {
        input: Box<LogicalPlan>,
        order_by: Vec<OrderByItem>,
    },

    // Project (SELECT columns)
    Projection {
        input: Box<LogicalPlan>,
        items: Vec<ProjectionItem>,
        distinct: bool,
    },

    // Limit
    Limit {
        input: Box<LogicalPlan>,
        limit: Option<u64>,
        offset: u64,
    },
}

/// One output column: the expression and the name it is reported under.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    pub expr: Expr,
    pub name: String,
}

/// Builds the fixed SELECT pipeline. `*` is expanded against the catalog
/// here, so the executor only ever sees explicit column lists.
pub struct Planner<'a> {
    catalog: &'a Catalog,
}

impl<'a> Planner<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn plan(&self, stmt: &SelectStatement) -> Result<LogicalPlan> {
        let tables = self.source_tables(stmt)?;

        // Build the base plan from FROM clause and JOINs
        let mut plan = scan(&stmt.from);
        for join in &stmt.joins {
            plan = LogicalPlan::Join {
                left: Box::new(plan),
                right: Box::new(scan(&join.table)),
                join_type: join.join_type,
                condition: join.condition.clone(),
            };
        }

        if let Some(predicate) = &stmt.where_clause {
            reject_aggregate(predicate, "WHERE")?;
            plan = LogicalPlan::Filter {
                input: Box::new(plan),
                predicate: predicate.clone(),
            };
        }

        let items = self.plan_projection(stmt, &tables)?;
        let order_by = resolve_order_by(&stmt.order_by, &items)?;

        let aggregated = !stmt.group_by.is_empty()
            || stmt.having.is_some()
            || items.iter().any(|item| item.expr.contains_aggregate());

        if aggregated {
            let has_star = stmt
                .columns
                .iter()
                .any(|c| !matches!(c, SelectColumn::Expr { .. }));
            if has_star {
                return Err(EngineError::InvalidOperation(
                    "SELECT * cannot be combined with GROUP BY or aggregate functions".to_string(),
                ));
            }
            for expr in &stmt.group_by {
                reject_aggregate(expr, "GROUP BY")?;
            }

            let mut aggregates = Vec::new();
            let mut seen = HashSet::new();
            let exprs = items
                .iter()
                .map(|item| &item.expr)
                .chain(stmt.having.iter())
                .chain(order_by.iter().map(|item| &item.expr));
            for expr in exprs {
                collect_aggregates(expr, &mut aggregates, &mut seen);
            }

            plan = LogicalPlan::Aggregate {
                input: Box::new(plan),
                group_by: stmt.group_by.clone(),
                aggregates,
            };

            if let Some(having) = &stmt.having {
                plan = LogicalPlan::Filter {
                    input: Box::new(plan),
                    predicate: having.clone(),
                };
            }
        }

        if !order_by.is_empty() {
            plan = LogicalPlan::Sort {
                input: Box::new(plan),
                order_by,
            };
        }

        plan = LogicalPlan::Projection {
            input: Box::new(plan),
            items,
            distinct: stmt.distinct,
        };

        if stmt.limit.is_some() || stmt.offset.is_some() {
            plan = LogicalPlan::Limit {
                input: Box::new(plan),
                limit: stmt.limit,
                offset: stmt.offset.unwrap_or(0),
            };
        }

        Ok(plan)
    }

    /// Every table in FROM and JOIN order. Effective names must be unique.
    fn source_tables<'s>(&self, stmt: &'s SelectStatement) -> Result<Vec<&'s TableRef>> {
        let tables: Vec<&TableRef> = std::iter::once(&stmt.from)
            .chain(stmt.joins.iter().map(|j| &j.table))
            .collect();

        let mut seen = HashSet::new();
        for table in &tables {
            self.catalog.table(&table.name)?;
            if !seen.insert(table.effective_name().to_lowercase()) {
                return Err(EngineError::InvalidOperation(format!(
                    "table name '{}' specified more than once",
                    table.effective_name()
                )));
            }
        }

        Ok(tables)
    }

    fn plan_projection(
        &self,
        stmt: &SelectStatement,
        tables: &[&TableRef],
    ) -> Result<Vec<ProjectionItem>> {
        let mut items = Vec::new();

        for col in &stmt.columns {
            match col {
                SelectColumn::AllColumns => {
                    for table in tables {
                        self.expand_table(table, &mut items)?;
                    }
                }
                SelectColumn::TableAllColumns(name) => {
                    let table = tables
                        .iter()
                        .find(|t| t.effective_name().eq_ignore_ascii_case(name))
                        .ok_or_else(|| EngineError::UnknownTable(name.clone()))?;
                    self.expand_table(table, &mut items)?;
                }
                SelectColumn::Expr { expr, alias } => items.push(ProjectionItem {
                    expr: expr.clone(),
                    name: output_name(expr, alias.as_deref()),
                }),
            }
        }

        Ok(items)
    }

    fn expand_table(&self, table_ref: &TableRef, items: &mut Vec<ProjectionItem>) -> Result<()> {
        let table = self.catalog.table(&table_ref.name)?;
        for column in &table.schema.columns {
            items.push(ProjectionItem {
                expr: Expr::Column(ColumnRef::with_table(
                    table_ref.effective_name(),
                    column.name.clone(),
                )),
                name: column.name.clone(),
            });
        }
        Ok(())
    }
}

fn scan(table: &TableRef) -> LogicalPlan {
    LogicalPlan::TableScan {
        table_name: table.name.clone(),
        alias: table.alias.clone(),
    }
}

/// Alias if given, else the column name, else the lower-cased function name,
/// else the expression text.
pub fn output_name(expr: &Expr, alias: Option<&str>) -> String {
    if let Some(alias) = alias {
        return alias.to_string();
    }
    match expr {
        Expr::Column(col) => col.column.clone(),
        Expr::Function { name, .. } => name.to_lowercase(),
        other => other.to_string(),
    }
}

/// Rewrites ORDER BY keys that name an output column or a 1-based position
/// into the projected expression.
fn resolve_order_by(order_by: &[OrderByItem], items: &[ProjectionItem]) -> Result<Vec<OrderByItem>> {
    order_by
        .iter()
        .map(|item| {
            let expr = match &item.expr {
                Expr::Literal(Value::Integer(position)) => {
                    let index = usize::try_from(*position)
                        .ok()
                        .filter(|p| (1..=items.len()).contains(p))
                        .ok_or_else(|| {
                            EngineError::InvalidOperation(format!(
                                "ORDER BY position {} is not in select list",
                                position
                            ))
                        })?;
                    items[index - 1].expr.clone()
                }
                Expr::Column(ColumnRef {
                    table: None,
                    column,
                }) => items
                    .iter()
                    .find(|p| p.name.eq_ignore_ascii_case(column))
                    .map(|p| p.expr.clone())
                    .unwrap_or_else(|| item.expr.clone()),
                other => other.clone(),
            };
            Ok(OrderByItem {
                expr,
                ascending: item.ascending,
            })
        })
        .collect()
}

fn reject_aggregate(expr: &Expr, clause: &str) -> Result<()> {
    if expr.contains_aggregate() {
        return Err(EngineError::InvalidOperation(format!(
            "aggregate functions are not allowed in {}",
            clause
        )));
    }
    Ok(())
}

/// Outermost aggregate calls in `expr`, deduplicated by [`Expr::key`].
fn collect_aggregates(expr: &Expr, out: &mut Vec<Expr>, seen: &mut HashSet<String>) {
    if expr.is_aggregate() {
        if seen.insert(expr.key()) {
            out.push(expr.clone());
        }
        return;
    }

    match expr {
        Expr::Literal(_) | Expr::Column(_) => {}
        Expr::BinaryOp { left, right, .. } => {
            collect_aggregates(left, out, seen);
            collect_aggregates(right, out, seen);
        }
        Expr::UnaryOp { expr, .. } | Expr::IsNull { expr, .. } => collect_aggregates(expr, out, seen),
        Expr::Function { args, .. } => {
            if let FunctionArgs::List(args) = args {
                for arg in args {
                    collect_aggregates(arg, out, seen);
                }
            }
        }
        Expr::InList { expr, list, .. } => {
            collect_aggregates(expr, out, seen);
            for item in list {
                collect_aggregates(item, out, seen);
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_aggregates(expr, out, seen);
            collect_aggregates(low, out, seen);
            collect_aggregates(high, out, seen);
        }
        Expr::Like { expr, pattern, .. } => {
            collect_aggregates(expr, out, seen);
            collect_aggregates(pattern, out, seen);
        }
    }
}
