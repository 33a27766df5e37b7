use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod db;

pub static YEAR_COLLECTION_NAME: &str = "academic_years";

/// An institution-wide academic year. At most one document carries
/// `is_current = true`; `db` scopes every clearing write to uphold that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicYear {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub name: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub from_year: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub to_year: DateTime<Utc>,
    #[serde(default)]
    pub is_current: bool,

    #[serde(
        default = "Utc::now",
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime"
    )]
    pub created_at: DateTime<Utc>,
    #[serde(
        default = "Utc::now",
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime"
    )]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearResponse {
    pub id: Uuid,
    pub name: String,
    pub from_year: DateTime<Utc>,
    pub to_year: DateTime<Utc>,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AcademicYear> for YearResponse {
    fn from(year: AcademicYear) -> Self {
        YearResponse {
            id: year.id,
            name: year.name,
            from_year: year.from_year,
            to_year: year.to_year,
            is_current: year.is_current,
            created_at: year.created_at,
            updated_at: year.updated_at,
        }
    }
}
