use std::fmt;

use crate::storage::table::{ColumnDef, Constraints, Value};

pub const AGGREGATE_FUNCTIONS: [&str; 5] = ["COUNT", "SUM", "AVG", "MIN", "MAX"];

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    CreateTable(CreateTableStatement),
    DropTable(DropTableStatement),
}

impl Statement {
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
            Statement::CreateTable(_) => "CREATE TABLE",
            Statement::DropTable(_) => "DROP TABLE",
        }
    }

    /// The table the statement reads from or writes to.
    pub fn table_name(&self) -> &str {
        match self {
            Statement::Select(s) => &s.from.name,
            Statement::Insert(s) => &s.table,
            Statement::Update(s) => &s.table,
            Statement::Delete(s) => &s.table,
            Statement::CreateTable(s) => &s.name,
            Statement::DropTable(s) => &s.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub distinct: bool,
    pub columns: Vec<SelectColumn>,
    pub from: TableRef,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectStatement {
    pub fn new(from: TableRef) -> Self {
        Self {
            distinct: false,
            columns: Vec::new(),
            from,
            joins: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    AllColumns,
    TableAllColumns(String),
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn effective_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: TableRef,
    pub condition: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    /// Explicit target columns; `None` means every column in declaration order.
    pub columns: Option<Vec<String>>,
    pub rows: Vec<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub name: String,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
    pub constraints: Constraints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    pub name: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),

    // Column reference
    Column(ColumnRef),

    // Binary operations
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    // Unary operations
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },

    // Function calls, aggregates included
    Function {
        name: String,
        args: FunctionArgs,
        distinct: bool,
    },

    // IS NULL / IS NOT NULL
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },

    // IN (list)
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },

    // BETWEEN
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    // LIKE
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::new(name))
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// True for a call to COUNT, SUM, AVG, MIN or MAX.
    pub fn is_aggregate(&self) -> bool {
        match self {
            Expr::Function { name, .. } => AGGREGATE_FUNCTIONS
                .iter()
                .any(|agg| agg.eq_ignore_ascii_case(name)),
            _ => false,
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        if self.is_aggregate() {
            return true;
        }
        match self {
            Expr::Literal(_) | Expr::Column(_) => false,
            Expr::BinaryOp { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Expr::UnaryOp { expr, .. } | Expr::IsNull { expr, .. } => expr.contains_aggregate(),
            Expr::Function { args, .. } => match args {
                FunctionArgs::Wildcard => false,
                FunctionArgs::List(list) => list.iter().any(Expr::contains_aggregate),
            },
            Expr::InList { expr, list, .. } => {
                expr.contains_aggregate() || list.iter().any(Expr::contains_aggregate)
            }
            Expr::Between {
                expr, low, high, ..
            } => expr.contains_aggregate() || low.contains_aggregate() || high.contains_aggregate(),
            Expr::Like { expr, pattern, .. } => {
                expr.contains_aggregate() || pattern.contains_aggregate()
            }
        }
    }

    /// SQL text with identifiers lower-cased. Grouped relations find group
    /// keys and aggregates by this, so `AGE + 1` matches `age + 1`.
    pub fn key(&self) -> String {
        self.lowercase_identifiers().to_string()
    }

    fn lowercase_identifiers(&self) -> Expr {
        fn lower(expr: &Expr) -> Box<Expr> {
            Box::new(expr.lowercase_identifiers())
        }
        fn lower_all(list: &[Expr]) -> Vec<Expr> {
            list.iter().map(Expr::lowercase_identifiers).collect()
        }

        match self {
            Expr::Literal(_) => self.clone(),
            Expr::Column(col) => Expr::Column(ColumnRef {
                table: col.table.as_ref().map(|t| t.to_lowercase()),
                column: col.column.to_lowercase(),
            }),
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: lower(left),
                op: *op,
                right: lower(right),
            },
            Expr::UnaryOp { op, expr } => Expr::UnaryOp {
                op: *op,
                expr: lower(expr),
            },
            Expr::Function {
                name,
                args,
                distinct,
            } => Expr::Function {
                name: name.clone(),
                args: match args {
                    FunctionArgs::Wildcard => FunctionArgs::Wildcard,
                    FunctionArgs::List(list) => FunctionArgs::List(lower_all(list)),
                },
                distinct: *distinct,
            },
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: lower(expr),
                negated: *negated,
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => Expr::InList {
                expr: lower(expr),
                list: lower_all(list),
                negated: *negated,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Expr::Between {
                expr: lower(expr),
                low: lower(low),
                high: lower(high),
                negated: *negated,
            },
            Expr::Like {
                expr,
                pattern,
                negated,
            } => Expr::Like {
                expr: lower(expr),
                pattern: lower(pattern),
                negated: *negated,
            },
        }
    }

    /// Binding strength used when rendering; higher binds tighter.
    fn precedence(&self) -> u8 {
        match self {
            Expr::BinaryOp { op, .. } => op.precedence(),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                ..
            } => 3,
            Expr::UnaryOp { .. } => 7,
            Expr::IsNull { .. } | Expr::InList { .. } | Expr::Between { .. } | Expr::Like { .. } => 4,
            _ => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArgs {
    /// `COUNT(*)`
    Wildcard,
    List(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn with_table(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical
    And,
    Or,

    // String
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

impl BinaryOperator {
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::Lt
            | BinaryOperator::LtEq
            | BinaryOperator::Gt
            | BinaryOperator::GtEq => 4,
            BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Concat => 5,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 6,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 4
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Concat => "||",
        }
    }
}

/// Writes `expr`, parenthesized when it binds looser than `min`.
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if expr.precedence() < min {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, list: &[Expr]) -> fmt::Result {
    for (i, item) in list.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::Text(s)) => write!(f, "'{}'", s.replace('\'', "''")),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Column(col) => write!(f, "{}", col),
            Expr::BinaryOp { left, op, right } => {
                let p = op.precedence();
                // comparisons do not chain, so a comparison operand needs parens
                let left_min = if op.is_comparison() { p + 1 } else { p };
                write_operand(f, left, left_min)?;
                write!(f, " {} ", op.symbol())?;
                // left-associative: an equal-precedence right operand needs parens
                write_operand(f, right, p + 1)
            }
            Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => {
                    write!(f, "NOT ")?;
                    write_operand(f, expr, 3)
                }
                UnaryOperator::Minus => {
                    write!(f, "-")?;
                    write_operand(f, expr, 7)
                }
                UnaryOperator::Plus => {
                    write!(f, "+")?;
                    write_operand(f, expr, 7)
                }
            },
            Expr::Function {
                name,
                args,
                distinct,
            } => {
                write!(f, "{}(", name.to_uppercase())?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                match args {
                    FunctionArgs::Wildcard => write!(f, "*")?,
                    FunctionArgs::List(list) => write_list(f, list)?,
                }
                write!(f, ")")
            }
            Expr::IsNull { expr, negated } => {
                write_operand(f, expr, 5)?;
                write!(f, " IS {}NULL", if *negated { "NOT " } else { "" })
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                write_operand(f, expr, 5)?;
                write!(f, " {}IN (", if *negated { "NOT " } else { "" })?;
                write_list(f, list)?;
                write!(f, ")")
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                write_operand(f, expr, 5)?;
                write!(f, " {}BETWEEN ", if *negated { "NOT " } else { "" })?;
                write_operand(f, low, 5)?;
                write!(f, " AND ")?;
                write_operand(f, high, 5)
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                write_operand(f, expr, 5)?;
                write!(f, " {}LIKE ", if *negated { "NOT " } else { "" })?;
                write_operand(f, pattern, 5)
            }
        }
    }
}
