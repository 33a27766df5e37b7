use bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::StreamExt;
use uuid::Uuid;

use crate::middleware::paging::PageQuery;
use crate::resp::problem::Problem;

use super::{default_capacity, Class, CLASS_COLLECTION_NAME};

pub mod problem {
    use crate::resp::problem::{problems, Problem};
    use uuid::Uuid;

    #[inline]
    pub fn already_exists(name: impl ToString) -> Problem {
        problems::duplicate_entity(
            "Class with this name already exists for the specified academic year.",
        )
        .insert_str("name", name)
        .to_owned()
    }

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        problems::not_found("Class not found.")
            .insert_str("id", id)
            .to_owned()
    }
}

pub mod filter {
    use bson::{doc, Document};
    use uuid::Uuid;

    use crate::data::ci_regex;

    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": bson::Uuid::from_uuid_1(id) }
    }

    pub fn by_name_and_year(name: &str, academic_year: Uuid) -> Document {
        doc! {
            "name": name,
            "academic_year": bson::to_bson(&academic_year).expect("Uuid must be serializable to BSON"),
        }
    }

    /// Uniqueness probe for updates: any *other* class with the same
    /// {name, academic_year} pair.
    pub fn duplicate_except(name: &str, academic_year: Uuid, id: Uuid) -> Document {
        let mut query = by_name_and_year(name, academic_year);
        query.insert("_id", doc! { "$ne": bson::Uuid::from_uuid_1(id) });
        query
    }

    pub fn name_search(needle: &str) -> Document {
        doc! { "name": ci_regex(needle) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassCreateData {
    pub name: String,
    pub academic_year: Uuid,
    pub class_teacher: Uuid,
    pub capacity: Option<u32>,
}

impl From<ClassCreateData> for Class {
    fn from(data: ClassCreateData) -> Self {
        let now = crate::data::now_millis();
        Class {
            id: Uuid::new_v4(),
            name: data.name,
            academic_year: data.academic_year,
            class_teacher: data.class_teacher,
            subject: Vec::new(),
            students: Vec::new(),
            capacity: data.capacity.unwrap_or_else(default_capacity),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassUpdateData {
    pub name: Option<String>,
    pub academic_year: Option<Uuid>,
    pub class_teacher: Option<Uuid>,
    pub subject: Option<Vec<Uuid>>,
    pub students: Option<Vec<Uuid>>,
    pub capacity: Option<u32>,
}

impl ClassUpdateData {
    pub fn into_update(self) -> Document {
        let mut set = doc! { "updated_at": bson::DateTime::now() };
        if let Some(name) = self.name {
            set.insert("name", name);
        }
        if let Some(academic_year) = self.academic_year {
            set.insert(
                "academic_year",
                bson::to_bson(&academic_year).expect("Uuid must be serializable to BSON"),
            );
        }
        if let Some(class_teacher) = self.class_teacher {
            set.insert(
                "class_teacher",
                bson::to_bson(&class_teacher).expect("Uuid must be serializable to BSON"),
            );
        }
        if let Some(subject) = self.subject {
            set.insert(
                "subject",
                bson::to_bson(&subject).expect("Uuid list must be serializable to BSON"),
            );
        }
        if let Some(students) = self.students {
            set.insert(
                "students",
                bson::to_bson(&students).expect("Uuid list must be serializable to BSON"),
            );
        }
        if let Some(capacity) = self.capacity {
            set.insert("capacity", capacity);
        }
        doc! { "$set": set }
    }
}

pub trait ClassDbExt {
    async fn create_class(&self, data: ClassCreateData) -> Result<Class, Problem>;

    async fn update_class(
        &self,
        id: Uuid,
        patch: ClassUpdateData,
    ) -> Result<Option<Class>, Problem>;

    async fn delete_class(&self, id: Uuid) -> Result<Option<Class>, Problem>;

    async fn list_classes(&self, page: &PageQuery) -> Result<(Vec<Class>, u64), Problem>;
}

impl ClassDbExt for Database {
    async fn create_class(&self, data: ClassCreateData) -> Result<Class, Problem> {
        let classes = self.collection::<Class>(CLASS_COLLECTION_NAME);

        let existing = classes
            .find_one(
                filter::by_name_and_year(&data.name, data.academic_year),
                None,
            )
            .await
            .map_err(Problem::from)?;
        if existing.is_some() {
            return Err(problem::already_exists(&data.name));
        }

        let class = Class::from(data);
        classes
            .insert_one(&class, None)
            .await
            .map_err(Problem::from)?;

        Ok(class)
    }

    /// Re-checks {name, academic_year} uniqueness against the patched values
    /// before applying anything, excluding the class being updated.
    async fn update_class(
        &self,
        id: Uuid,
        patch: ClassUpdateData,
    ) -> Result<Option<Class>, Problem> {
        let classes = self.collection::<Class>(CLASS_COLLECTION_NAME);

        let Some(current) = classes
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)?
        else {
            return Ok(None);
        };

        let name = patch.name.clone().unwrap_or(current.name);
        let academic_year = patch.academic_year.unwrap_or(current.academic_year);

        if classes
            .find_one(filter::duplicate_except(&name, academic_year, id), None)
            .await
            .map_err(Problem::from)?
            .is_some()
        {
            return Err(problem::already_exists(&name));
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        classes
            .find_one_and_update(filter::by_id(id), patch.into_update(), options)
            .await
            .map_err(Problem::from)
    }

    async fn delete_class(&self, id: Uuid) -> Result<Option<Class>, Problem> {
        self.collection::<Class>(CLASS_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn list_classes(&self, page: &PageQuery) -> Result<(Vec<Class>, u64), Problem> {
        let classes = self.collection::<Class>(CLASS_COLLECTION_NAME);
        let query = page
            .search
            .as_deref()
            .map(filter::name_search)
            .unwrap_or_default();

        let total = classes
            .count_documents(query.clone(), None)
            .await
            .map_err(Problem::from)?;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(page.skip())
            .limit(page.limit())
            .build();

        let mut cursor = classes.find(query, options).await.map_err(Problem::from)?;
        let mut found = Vec::new();
        while let Some(class) = cursor.next().await {
            match class {
                Ok(class) => found.push(class),
                Err(e) => tracing::warn!("unable to deserialize class document: {}", e),
            }
        }

        Ok((found, total))
    }
}
