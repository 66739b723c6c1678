use serde::{Deserialize, Serialize};

/// 學生資料表名稱
pub const STUDENT_TABLE: &str = "std";

/// A stored student row. Every field is a verbatim copy of the stored value;
/// only `id` is guaranteed to be present, the other columns may hold `NULL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// A student that has not been persisted yet; `id` is assigned by the engine.
/// An empty CSV field deserializes to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl NewStudent {
    pub fn new(
        name: impl Into<String>,
        age: i32,
        address: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            age: Some(age),
            address: Some(address.into()),
            phone: Some(phone.into()),
        }
    }

    pub fn with_id(self, id: i64) -> Student {
        Student {
            id,
            name: self.name,
            age: self.age,
            address: self.address,
            phone: self.phone,
        }
    }
}
