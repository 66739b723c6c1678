use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use student_criteria::core::criteria::{Row, SelectQuery, SqlValue};
use student_criteria::core::QueryBackend;
use student_criteria::{QueryError, StudentQueryService};

/// Replays canned row sets and records the SQL it was asked to run.
#[derive(Default)]
struct RecordingBackend {
    responses: Mutex<VecDeque<Vec<Row>>>,
    issued: Mutex<Vec<String>>,
}

impl RecordingBackend {
    fn with_responses(responses: Vec<Vec<Row>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            issued: Mutex::new(Vec::new()),
        }
    }

    fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryBackend for RecordingBackend {
    async fn query(&self, query: &SelectQuery) -> student_criteria::Result<Vec<Row>> {
        self.issued.lock().unwrap().push(query.to_sql().sql);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

fn student_row(id: i64, name: &str, age: i64, address: &str) -> Row {
    vec![
        SqlValue::Integer(id),
        SqlValue::from(name),
        SqlValue::Integer(age),
        SqlValue::from(address),
        SqlValue::from("0912345678"),
    ]
}

#[tokio::test]
async fn test_no_refetch_without_duplicate_groups() -> Result<()> {
    let service = StudentQueryService::new(RecordingBackend::with_responses(vec![vec![]]));

    let found = service.find_duplicates_by_name_and_address().await?;
    assert!(found.is_empty());

    let issued = service.backend().issued();
    assert_eq!(issued.len(), 1);
    assert!(issued[0].contains("GROUP BY name, address HAVING COUNT(*) > ?1"));
    Ok(())
}

#[tokio::test]
async fn test_duplicate_refetch_uses_group_pairs() -> Result<()> {
    let groups = vec![vec![SqlValue::from("Ann"), SqlValue::from("X")]];
    let rows = vec![
        student_row(4, "Ann", 21, "X"),
        student_row(1, "Ann", 20, "X"),
    ];
    let service = StudentQueryService::new(RecordingBackend::with_responses(vec![groups, rows]));

    let found = service.find_duplicates_by_name_and_address().await?;
    assert_eq!(found.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 4]);

    let issued = service.backend().issued();
    assert_eq!(issued.len(), 2);
    assert!(issued[1].contains("WHERE (name = ?1) AND (address = ?2)"));
    Ok(())
}

#[tokio::test]
async fn test_max_age_is_aggregate_then_refetch() -> Result<()> {
    let service = StudentQueryService::new(RecordingBackend::with_responses(vec![
        vec![vec![SqlValue::Integer(30)]],
        vec![student_row(2, "Carl", 30, "Y")],
    ]));

    let found = service.find_with_max_age().await?;
    assert_eq!(found.len(), 1);

    let issued = service.backend().issued();
    assert_eq!(issued[0], "SELECT MAX(age) FROM std");
    assert!(issued[1].ends_with("WHERE age = ?1"));
    Ok(())
}

#[tokio::test]
async fn test_null_aggregate_stops_before_refetch() -> Result<()> {
    let service = StudentQueryService::new(RecordingBackend::with_responses(vec![vec![vec![
        SqlValue::Null,
    ]]]));

    let result = service.find_youngest_by_address("Nowhere").await;
    assert!(matches!(result, Err(QueryError::NotFound { .. })));
    assert_eq!(service.backend().issued().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_aggregate_returning_several_rows_is_multiplicity() -> Result<()> {
    let service = StudentQueryService::new(RecordingBackend::with_responses(vec![vec![
        vec![SqlValue::Integer(30)],
        vec![SqlValue::Integer(31)],
    ]]));

    let result = service.find_with_max_age().await;
    assert!(matches!(
        result,
        Err(QueryError::Multiplicity {
            expected: 1,
            actual: 2
        })
    ));
    Ok(())
}

#[tokio::test]
async fn test_malformed_rows_surface_as_mapping_errors() -> Result<()> {
    let service = StudentQueryService::new(RecordingBackend::with_responses(vec![vec![vec![
        SqlValue::Integer(1),
        SqlValue::Null,
    ]]]));

    let result = service.find_all_order_by_name_then_age().await;
    assert!(matches!(result, Err(QueryError::RowMapping { .. })));
    Ok(())
}
