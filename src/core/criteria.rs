//! Typed query construction for the student table.
//!
//! Queries are plain values: build a [`SelectQuery`], then render it with
//! [`SelectQuery::to_sql`] into SQL text with `?N` placeholders and the
//! ordered parameter list. Caller-supplied values are always bound, never
//! spliced into the SQL text.

use crate::domain::model::STUDENT_TABLE;

/// One result row, values in projection order.
pub type Row = Vec<SqlValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(i64::from(v))
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Name,
    Age,
    Address,
    Phone,
}

impl Column {
    /// Entity column order; row decoding relies on it.
    pub const ALL: [Column; 5] = [
        Column::Id,
        Column::Name,
        Column::Age,
        Column::Address,
        Column::Phone,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Name => "name",
            Column::Age => "age",
            Column::Address => "address",
            Column::Phone => "phone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Min,
    Max,
}

impl AggregateFn {
    fn as_str(self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(Column),
    Length(Column),
    Aggregate(AggregateFn, Column),
    CountAll,
}

impl Operand {
    pub fn max(column: Column) -> Self {
        Operand::Aggregate(AggregateFn::Max, column)
    }

    pub fn min(column: Column) -> Self {
        Operand::Aggregate(AggregateFn::Min, column)
    }

    pub fn count(column: Column) -> Self {
        Operand::Aggregate(AggregateFn::Count, column)
    }

    fn render(&self) -> String {
        match self {
            Operand::Column(c) => c.as_str().to_string(),
            Operand::Length(c) => format!("LENGTH({})", c.as_str()),
            Operand::Aggregate(f, c) => format!("{}({})", f.as_str(), c.as_str()),
            Operand::CountAll => "COUNT(*)".to_string(),
        }
    }
}

impl From<Column> for Operand {
    fn from(c: Column) -> Self {
        Operand::Column(c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CmpOp {
    fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    False,
    Cmp {
        lhs: Operand,
        op: CmpOp,
        value: SqlValue,
    },
    Like {
        column: Column,
        pattern: String,
        escape: Option<char>,
        negated: bool,
    },
    Regexp {
        column: Column,
        pattern: String,
        negated: bool,
    },
    IsNull(Column),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

/// LIKE escape character used by [`Predicate::contains`].
pub const LIKE_ESCAPE: char = '\\';

impl Predicate {
    pub fn cmp(lhs: impl Into<Operand>, op: CmpOp, value: impl Into<SqlValue>) -> Self {
        Predicate::Cmp {
            lhs: lhs.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(lhs: impl Into<Operand>, value: impl Into<SqlValue>) -> Self {
        Self::cmp(lhs, CmpOp::Eq, value)
    }

    /// Inclusive on both ends.
    pub fn between(column: Column, min: impl Into<SqlValue>, max: impl Into<SqlValue>) -> Self {
        Predicate::And(vec![
            Self::cmp(column, CmpOp::Gte, min),
            Self::cmp(column, CmpOp::Lte, max),
        ])
    }

    /// Literal substring match; LIKE wildcards in `needle` are escaped.
    pub fn contains(column: Column, needle: &str) -> Self {
        Predicate::Like {
            column,
            pattern: format!("%{}%", escape_like(needle, LIKE_ESCAPE)),
            escape: Some(LIKE_ESCAPE),
            negated: false,
        }
    }

    /// Raw LIKE pattern without an ESCAPE clause.
    pub fn not_like(column: Column, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            column,
            pattern: pattern.into(),
            escape: None,
            negated: true,
        }
    }

    pub fn not_regexp(column: Column, pattern: impl Into<String>) -> Self {
        Predicate::Regexp {
            column,
            pattern: pattern.into(),
            negated: true,
        }
    }

    /// `column = value`, or `column IS NULL` when there is no value.
    pub fn eq_nullable<V: Into<SqlValue>>(column: Column, value: Option<V>) -> Self {
        match value {
            Some(v) => Self::eq(column, v),
            None => Predicate::IsNull(column),
        }
    }

    fn render(&self, out: &mut SqlWriter) -> String {
        match self {
            Predicate::True => "1 = 1".to_string(),
            Predicate::False => "1 = 0".to_string(),
            Predicate::Cmp { lhs, op, value } => {
                let placeholder = out.bind(value.clone());
                format!("{} {} {}", lhs.render(), op.as_str(), placeholder)
            }
            Predicate::Like {
                column,
                pattern,
                escape,
                negated,
            } => {
                let placeholder = out.bind(SqlValue::Text(pattern.clone()));
                let not = if *negated { "NOT " } else { "" };
                match escape {
                    Some(ch) => format!(
                        "{} {}LIKE {} ESCAPE '{}'",
                        column.as_str(),
                        not,
                        placeholder,
                        ch
                    ),
                    None => format!("{} {}LIKE {}", column.as_str(), not, placeholder),
                }
            }
            Predicate::Regexp {
                column,
                pattern,
                negated,
            } => {
                let placeholder = out.bind(SqlValue::Text(pattern.clone()));
                let not = if *negated { "NOT " } else { "" };
                format!("{} {}REGEXP {}", column.as_str(), not, placeholder)
            }
            Predicate::IsNull(column) => format!("{} IS NULL", column.as_str()),
            Predicate::And(parts) => render_joined(parts, " AND ", Predicate::True, out),
            Predicate::Or(parts) => render_joined(parts, " OR ", Predicate::False, out),
        }
    }
}

// 空的 AND/OR 以常數條件取代，避免產生 `WHERE ()`
fn render_joined(parts: &[Predicate], sep: &str, empty: Predicate, out: &mut SqlWriter) -> String {
    match parts {
        [] => empty.render(out),
        [single] => single.render(out),
        _ => {
            let rendered: Vec<String> = parts
                .iter()
                .map(|p| format!("({})", p.render(out)))
                .collect();
            rendered.join(sep)
        }
    }
}

pub fn escape_like(input: &str, escape: char) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch == '%' || ch == '_' || ch == escape {
            escaped.push(escape);
        }
        escaped.push(ch);
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
enum Projection {
    /// Every entity column, in [`Column::ALL`] order.
    Entity,
    Operands(Vec<Operand>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    projection: Projection,
    distinct: bool,
    filter: Option<Predicate>,
    group_by: Vec<Column>,
    having: Option<Predicate>,
    order_by: Vec<(Column, Order)>,
    limit: Option<usize>,
}

/// SQL text plus its positional parameters (`?1` is `params[0]`).
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SelectQuery {
    fn with_projection(projection: Projection) -> Self {
        Self {
            projection,
            distinct: false,
            filter: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn entities() -> Self {
        Self::with_projection(Projection::Entity)
    }

    pub fn select<I, O>(operands: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Operand>,
    {
        Self::with_projection(Projection::Operands(
            operands.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn group_by<I: IntoIterator<Item = Column>>(mut self, columns: I) -> Self {
        self.group_by.extend(columns);
        self
    }

    pub fn having(mut self, predicate: Predicate) -> Self {
        self.having = Some(predicate);
        self
    }

    pub fn order_by(mut self, column: Column, order: Order) -> Self {
        self.order_by.push((column, order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn column_count(&self) -> usize {
        match &self.projection {
            Projection::Entity => Column::ALL.len(),
            Projection::Operands(ops) => ops.len(),
        }
    }

    pub fn to_sql(&self) -> RenderedQuery {
        let mut out = SqlWriter::default();
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        let columns: Vec<String> = match &self.projection {
            Projection::Entity => Column::ALL.iter().map(|c| c.as_str().to_string()).collect(),
            Projection::Operands(ops) => ops.iter().map(Operand::render).collect(),
        };
        sql.push_str(&columns.join(", "));
        sql.push_str(" FROM ");
        sql.push_str(STUDENT_TABLE);

        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.render(&mut out));
        }

        if !self.group_by.is_empty() {
            let cols: Vec<&str> = self.group_by.iter().map(|c| c.as_str()).collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&cols.join(", "));
        }

        if let Some(having) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(&having.render(&mut out));
        }

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|(c, o)| match o {
                    Order::Asc => format!("{} ASC", c.as_str()),
                    Order::Desc => format!("{} DESC", c.as_str()),
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        RenderedQuery {
            sql,
            params: out.params,
        }
    }
}

#[derive(Default)]
struct SqlWriter {
    params: Vec<SqlValue>,
}

impl SqlWriter {
    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }
}
