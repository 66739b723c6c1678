use crate::core::criteria::{CmpOp, Column, Operand, Order, Predicate, Row, SelectQuery, SqlValue};
use crate::domain::model::Student;
use crate::domain::ports::{ConfigProvider, QueryBackend};
use crate::utils::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A phone number is valid when it is exactly ten ASCII digits.
pub const VALID_PHONE_PATTERN: &str = "^[0-9]{10}$";
/// Text compared verbatim by [`PhoneCheck::Literal`].
pub const LITERAL_PHONE_PATTERN: &str = r"\d{10}";
pub const PHONE_LENGTH: i64 = 10;

/// Upper bound on `(name, address)` pairs per refetch query (two bound
/// parameters each, SQLite caps a statement at 999 on older builds).
pub const MAX_PAIRS_PER_QUERY: usize = 400;

/// How `find_youngest_by_address` resolves several rows sharing the minimum age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum TiePolicy {
    /// Return the tied row with the smallest id.
    #[default]
    LowestId,
    /// Fail with [`QueryError::Multiplicity`].
    Strict,
}

/// Semantics of `find_with_invalid_phone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum PhoneCheck {
    /// Phone does not match `^[0-9]{10}$`.
    #[default]
    Pattern,
    /// `LENGTH(phone) <> 10 AND phone NOT LIKE '\d{10}'`, the pattern taken
    /// as literal text.
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceOptions {
    pub tie_policy: TiePolicy,
    pub phone_check: PhoneCheck,
}

impl ServiceOptions {
    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Self {
        Self {
            tie_policy: config.tie_policy(),
            phone_check: config.phone_check(),
        }
    }
}

/// Read-only queries over the student table. Stateless apart from its options.
pub struct StudentQueryService<B: QueryBackend> {
    backend: B,
    options: ServiceOptions,
}

impl<B: QueryBackend> StudentQueryService<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, ServiceOptions::default())
    }

    pub fn with_options(backend: B, options: ServiceOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> ServiceOptions {
        self.options
    }

    /// Rows with `min <= age <= max`. An inverted range yields no rows.
    pub async fn find_by_age_range(&self, min: i32, max: i32) -> Result<Vec<Student>> {
        tracing::debug!("find_by_age_range: min={}, max={}", min, max);
        let query = SelectQuery::entities().filter(Predicate::between(Column::Age, min, max));
        self.fetch_students(&query).await
    }

    /// Rows whose name contains `keyword`; an empty keyword matches everything.
    pub async fn find_by_name_keyword(&self, keyword: &str) -> Result<Vec<Student>> {
        tracing::debug!("find_by_name_keyword: keyword={:?}", keyword);
        let query = SelectQuery::entities().filter(Predicate::contains(Column::Name, keyword));
        self.fetch_students(&query).await
    }

    pub async fn find_all_order_by_name_then_age(&self) -> Result<Vec<Student>> {
        tracing::debug!("find_all_order_by_name_then_age");
        let query = SelectQuery::entities()
            .order_by(Column::Name, Order::Asc)
            .order_by(Column::Age, Order::Asc);
        self.fetch_students(&query).await
    }

    /// Every row sharing the maximum age. Fails with `NotFound` on an empty table.
    pub async fn find_with_max_age(&self) -> Result<Vec<Student>> {
        let max_query = SelectQuery::select([Operand::max(Column::Age)]);
        let max_age = self.fetch_single_int(&max_query, "MAX(age) over std").await?;
        tracing::debug!("find_with_max_age: max_age={}", max_age);

        let query = SelectQuery::entities().filter(Predicate::eq(Column::Age, max_age));
        self.fetch_students(&query).await
    }

    /// Row count per distinct age. Ages with no rows are absent; rows with a
    /// `NULL` age are counted under `None`.
    pub async fn count_by_age(&self) -> Result<BTreeMap<Option<i32>, u64>> {
        let query = SelectQuery::select([Operand::from(Column::Age), Operand::count(Column::Id)])
            .group_by([Column::Age]);
        let rows = self.backend.query(&query).await?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let age = opt_int_at(&row, 0, "age")?;
            let count = int_at(&row, 1, "count")?;
            let count = u64::try_from(count)
                .map_err(|_| QueryError::row_mapping(format!("negative count {}", count)))?;
            counts.insert(age.map(narrow_age).transpose()?, count);
        }
        tracing::debug!("count_by_age: {} distinct ages", counts.len());
        Ok(counts)
    }

    /// Each distinct address once; a `NULL` address shows up as `None`.
    pub async fn find_distinct_addresses(&self) -> Result<Vec<Option<String>>> {
        let query = SelectQuery::select([Column::Address]).distinct();
        let rows = self.backend.query(&query).await?;
        let addresses = rows
            .iter()
            .map(|row| opt_text_at(row, 0, "address"))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!("find_distinct_addresses: {} addresses", addresses.len());
        Ok(addresses)
    }

    /// The youngest student living at `address`.
    ///
    /// Fails with `NotFound` when nobody lives there. Ties at the minimum age
    /// are resolved by [`TiePolicy`].
    pub async fn find_youngest_by_address(&self, address: &str) -> Result<Student> {
        let min_query = SelectQuery::select([Operand::min(Column::Age)])
            .filter(Predicate::eq(Column::Address, address));
        let what = format!("MIN(age) for address {:?}", address);
        let min_age = self.fetch_single_int(&min_query, &what).await?;
        tracing::debug!(
            "find_youngest_by_address: address={:?}, min_age={}",
            address,
            min_age
        );

        let mut query = SelectQuery::entities()
            .filter(Predicate::And(vec![
                Predicate::eq(Column::Address, address),
                Predicate::eq(Column::Age, min_age),
            ]))
            .order_by(Column::Id, Order::Asc);
        if self.options.tie_policy == TiePolicy::LowestId {
            query = query.limit(1);
        }

        let students = self.fetch_students(&query).await?;
        single(students, || {
            format!("student aged {} at address {:?}", min_age, address)
        })
    }

    /// Rows with a malformed phone number, per the configured [`PhoneCheck`].
    pub async fn find_with_invalid_phone(&self) -> Result<Vec<Student>> {
        let predicate = match self.options.phone_check {
            PhoneCheck::Pattern => Predicate::not_regexp(Column::Phone, VALID_PHONE_PATTERN),
            PhoneCheck::Literal => Predicate::And(vec![
                Predicate::cmp(Operand::Length(Column::Phone), CmpOp::Ne, PHONE_LENGTH),
                Predicate::not_like(Column::Phone, LITERAL_PHONE_PATTERN),
            ]),
        };
        tracing::debug!(
            "find_with_invalid_phone: check={:?}",
            self.options.phone_check
        );
        let query = SelectQuery::entities().filter(predicate);
        self.fetch_students(&query).await
    }

    /// Every row whose `(name, address)` pair occurs more than once, ordered by id.
    /// `NULL` values pair with each other, as in `GROUP BY`.
    pub async fn find_duplicates_by_name_and_address(&self) -> Result<Vec<Student>> {
        let group_query = SelectQuery::select([Column::Name, Column::Address])
            .group_by([Column::Name, Column::Address])
            .having(Predicate::cmp(Operand::CountAll, CmpOp::Gt, 1));
        let groups = self
            .backend
            .query(&group_query)
            .await?
            .iter()
            .map(|row| -> Result<(Option<String>, Option<String>)> {
                Ok((opt_text_at(row, 0, "name")?, opt_text_at(row, 1, "address")?))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "find_duplicates_by_name_and_address: {} duplicate groups",
            groups.len()
        );
        // 沒有重複組合時不發出第二次查詢
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let mut students = Vec::new();
        for chunk in groups.chunks(MAX_PAIRS_PER_QUERY) {
            let predicate = Predicate::Or(
                chunk
                    .iter()
                    .map(|(name, address)| {
                        // GROUP BY 會把 NULL 歸為同一組，回查時要用 IS NULL
                        Predicate::And(vec![
                            Predicate::eq_nullable(Column::Name, name.as_deref()),
                            Predicate::eq_nullable(Column::Address, address.as_deref()),
                        ])
                    })
                    .collect(),
            );
            let query = SelectQuery::entities()
                .filter(predicate)
                .order_by(Column::Id, Order::Asc);
            students.extend(self.fetch_students(&query).await?);
        }
        students.sort_by_key(|s| s.id);
        Ok(students)
    }

    async fn fetch_students(&self, query: &SelectQuery) -> Result<Vec<Student>> {
        let rows = self.backend.query(query).await?;
        let students = rows
            .iter()
            .map(student_from_row)
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!("fetched {} students", students.len());
        Ok(students)
    }

    /// Runs a single-value aggregate; a `NULL` aggregate means there was nothing to aggregate.
    async fn fetch_single_int(&self, query: &SelectQuery, what: &str) -> Result<i32> {
        let rows = self.backend.query(query).await?;
        let row = single(rows, || what.to_string())?;
        match row.first() {
            None | Some(SqlValue::Null) => Err(QueryError::not_found(what)),
            Some(_) => narrow_age(int_at(&row, 0, what)?),
        }
    }
}

/// Exactly one element, or `NotFound` / `Multiplicity`.
pub fn single<T>(mut items: Vec<T>, what: impl FnOnce() -> String) -> Result<T> {
    match items.len() {
        0 => Err(QueryError::not_found(what())),
        1 => Ok(items.remove(0)),
        n => Err(QueryError::Multiplicity {
            expected: 1,
            actual: n,
        }),
    }
}

pub fn student_from_row(row: &Row) -> Result<Student> {
    if row.len() != Column::ALL.len() {
        return Err(QueryError::row_mapping(format!(
            "expected {} columns, got {}",
            Column::ALL.len(),
            row.len()
        )));
    }
    Ok(Student {
        id: int_at(row, 0, "id")?,
        name: opt_text_at(row, 1, "name")?,
        age: opt_int_at(row, 2, "age")?.map(narrow_age).transpose()?,
        address: opt_text_at(row, 3, "address")?,
        phone: opt_text_at(row, 4, "phone")?,
    })
}

fn int_at(row: &Row, idx: usize, column: &str) -> Result<i64> {
    row.get(idx).and_then(SqlValue::as_i64).ok_or_else(|| {
        QueryError::row_mapping(format!(
            "column {} ({}) is not an integer: {:?}",
            idx,
            column,
            row.get(idx)
        ))
    })
}

fn opt_int_at(row: &Row, idx: usize, column: &str) -> Result<Option<i64>> {
    match row.get(idx) {
        Some(SqlValue::Null) => Ok(None),
        _ => int_at(row, idx, column).map(Some),
    }
}

fn opt_text_at(row: &Row, idx: usize, column: &str) -> Result<Option<String>> {
    match row.get(idx) {
        Some(SqlValue::Null) => Ok(None),
        value => value
            .and_then(SqlValue::as_str)
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| {
                QueryError::row_mapping(format!(
                    "column {} ({}) is not text: {:?}",
                    idx, column, value
                ))
            }),
    }
}

fn narrow_age(age: i64) -> Result<i32> {
    i32::try_from(age).map_err(|_| QueryError::row_mapping(format!("age {} out of range", age)))
}
