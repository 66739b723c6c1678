pub mod criteria;
pub mod service;

pub use crate::domain::model::{NewStudent, Student};
pub use crate::domain::ports::{ConfigProvider, QueryBackend};
pub use crate::utils::error::Result;
