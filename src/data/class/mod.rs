use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod db;

pub static CLASS_COLLECTION_NAME: &str = "classes";

fn default_capacity() -> u32 {
    40
}

/// A class in a specific academic year. The {name, academic_year} pair is
/// unique; deleting a class does not clean up `student_class` references
/// held by users (known gap, see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub name: String,
    pub academic_year: Uuid,
    pub class_teacher: Uuid,

    #[serde(default)]
    pub subject: Vec<Uuid>,
    #[serde(default)]
    pub students: Vec<Uuid>,
    #[serde(default = "default_capacity")]
    pub capacity: u32,

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
pub struct ClassResponse {
    pub id: Uuid,
    pub name: String,
    pub academic_year: Uuid,
    pub class_teacher: Uuid,
    pub subject: Vec<Uuid>,
    pub students: Vec<Uuid>,
    pub capacity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Class> for ClassResponse {
    fn from(class: Class) -> Self {
        ClassResponse {
            id: class.id,
            name: class.name,
            academic_year: class.academic_year,
            class_teacher: class.class_teacher,
            subject: class.subject,
            students: class.students,
            capacity: class.capacity,
            created_at: class.created_at,
            updated_at: class.updated_at,
        }
    }
}
