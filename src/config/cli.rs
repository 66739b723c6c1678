use crate::config::toml_config::{LoggingConfig, TomlConfig};
use crate::core::service::{PhoneCheck, StudentQueryService, TiePolicy};
use crate::core::QueryBackend;
use crate::utils::error::Result;
use crate::utils::logger::LogFormat;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Parser)]
#[command(name = "student-criteria")]
#[command(about = "Run parameterized student queries against a SQLite database")]
pub struct CliConfig {
    #[arg(long, help = "SQLite database file (overrides the config file)")]
    pub database: Option<String>,

    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<String>,

    #[arg(long, value_enum)]
    pub tie_policy: Option<TiePolicy>,

    #[arg(long, value_enum)]
    pub phone_check: Option<PhoneCheck>,

    #[arg(long, help = "Import students from a CSV file before querying")]
    pub seed_csv: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: QueryCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum QueryCommand {
    /// Students with min <= age <= max
    AgeRange {
        #[arg(allow_negative_numbers = true)]
        min: i32,
        #[arg(allow_negative_numbers = true)]
        max: i32,
    },
    /// Students whose name contains the keyword
    NameKeyword { keyword: String },
    /// All students sorted by name, then age
    OrderByNameAge,
    /// Students sharing the maximum age
    MaxAge,
    /// Number of students per age
    CountByAge,
    /// Distinct addresses
    DistinctAddresses,
    /// Youngest student at an address
    YoungestByAddress { address: String },
    /// Students with a malformed phone number
    InvalidPhone,
    /// Students sharing a (name, address) pair with someone else
    Duplicates,
}

impl QueryCommand {
    pub fn name(&self) -> &'static str {
        match self {
            QueryCommand::AgeRange { .. } => "age-range",
            QueryCommand::NameKeyword { .. } => "name-keyword",
            QueryCommand::OrderByNameAge => "order-by-name-age",
            QueryCommand::MaxAge => "max-age",
            QueryCommand::CountByAge => "count-by-age",
            QueryCommand::DistinctAddresses => "distinct-addresses",
            QueryCommand::YoungestByAddress { .. } => "youngest-by-address",
            QueryCommand::InvalidPhone => "invalid-phone",
            QueryCommand::Duplicates => "duplicates",
        }
    }

    /// Runs the command and renders its result as JSON.
    pub async fn execute<B: QueryBackend>(&self, service: &StudentQueryService<B>) -> Result<Value> {
        let value = match self {
            QueryCommand::AgeRange { min, max } => {
                serde_json::to_value(service.find_by_age_range(*min, *max).await?)?
            }
            QueryCommand::NameKeyword { keyword } => {
                serde_json::to_value(service.find_by_name_keyword(keyword).await?)?
            }
            QueryCommand::OrderByNameAge => {
                serde_json::to_value(service.find_all_order_by_name_then_age().await?)?
            }
            QueryCommand::MaxAge => serde_json::to_value(service.find_with_max_age().await?)?,
            QueryCommand::CountByAge => count_by_age_json(service.count_by_age().await?),
            QueryCommand::DistinctAddresses => {
                serde_json::to_value(service.find_distinct_addresses().await?)?
            }
            QueryCommand::YoungestByAddress { address } => {
                serde_json::to_value(service.find_youngest_by_address(address).await?)?
            }
            QueryCommand::InvalidPhone => {
                serde_json::to_value(service.find_with_invalid_phone().await?)?
            }
            QueryCommand::Duplicates => {
                serde_json::to_value(service.find_duplicates_by_name_and_address().await?)?
            }
        };
        Ok(value)
    }
}

/// JSON object keys must be strings; a `NULL` age is keyed as `"null"`.
fn count_by_age_json(counts: BTreeMap<Option<i32>, u64>) -> Value {
    let object: Map<String, Value> = counts
        .into_iter()
        .map(|(age, count)| {
            let key = age.map_or_else(|| "null".to_string(), |a| a.to_string());
            (key, Value::from(count))
        })
        .collect();
    Value::Object(object)
}

impl CliConfig {
    /// Effective settings: the TOML file (or defaults) with command line flags on top.
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        if let Some(database) = &self.database {
            config.database.path = database.clone();
        }
        if let Some(seed) = &self.seed_csv {
            config.database.seed_csv = Some(seed.clone());
        }
        if let Some(policy) = self.tie_policy {
            config.query.tie_policy = policy;
        }
        if let Some(check) = self.phone_check {
            config.query.phone_check = check;
        }
        if self.verbose || self.json_logs {
            let logging = config.logging.get_or_insert(LoggingConfig {
                verbose: None,
                format: None,
            });
            if self.verbose {
                logging.verbose = Some(true);
            }
            if self.json_logs {
                logging.format = Some(LogFormat::Json.as_str().to_string());
            }
        }

        Ok(config)
    }
}
