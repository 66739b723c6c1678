use crate::core::criteria::{Row, SelectQuery};
use crate::core::service::{PhoneCheck, TiePolicy};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Relational execution backend. Runs a rendered query and hands back raw rows.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn query(&self, query: &SelectQuery) -> Result<Vec<Row>>;
}

pub trait ConfigProvider: Send + Sync {
    fn database_path(&self) -> &str;
    fn tie_policy(&self) -> TiePolicy;
    fn phone_check(&self) -> PhoneCheck;

    /// CSV used to seed an empty database.
    fn seed_csv(&self) -> Option<&str> {
        None
    }
}
