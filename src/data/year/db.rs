use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::StreamExt;
use uuid::Uuid;

use crate::middleware::paging::PageQuery;
use crate::resp::problem::Problem;

use super::{AcademicYear, YEAR_COLLECTION_NAME};

pub mod problem {
    use crate::resp::problem::{problems, Problem};
    use uuid::Uuid;

    #[inline]
    pub fn already_exists() -> Problem {
        problems::duplicate_entity("Academic year already exists.")
    }

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        problems::not_found("Academic year not found.")
            .insert_str("id", id)
            .to_owned()
    }

    #[inline]
    pub fn no_current_year() -> Problem {
        problems::not_found("No current academic year found.")
    }

    #[inline]
    pub fn current_year_locked() -> Problem {
        problems::conflict("Cannot delete current academic year.")
    }
}

pub mod filter {
    use bson::{doc, Document};
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use crate::data::ci_regex;

    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": bson::Uuid::from_uuid_1(id) }
    }

    pub fn by_span(from_year: &DateTime<Utc>, to_year: &DateTime<Utc>) -> Document {
        doc! {
            "from_year": bson::DateTime::from_chrono(*from_year),
            "to_year": bson::DateTime::from_chrono(*to_year),
        }
    }

    pub fn current() -> Document {
        doc! { "is_current": true }
    }

    /// Every *other* document currently flagged as the active year. Both
    /// create and update use this scoping so a failed write can't leave the
    /// whole collection rewritten.
    pub fn current_except(id: Uuid) -> Document {
        doc! {
            "is_current": true,
            "_id": { "$ne": bson::Uuid::from_uuid_1(id) },
        }
    }

    pub fn name_search(needle: &str) -> Document {
        doc! { "name": ci_regex(needle) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct YearCreateData {
    pub name: String,
    pub from_year: DateTime<Utc>,
    pub to_year: DateTime<Utc>,
    #[serde(default)]
    pub is_current: bool,
}

impl From<YearCreateData> for AcademicYear {
    fn from(data: YearCreateData) -> Self {
        let now = crate::data::now_millis();
        AcademicYear {
            id: Uuid::new_v4(),
            name: data.name,
            from_year: crate::data::clamp_to_millis(data.from_year),
            to_year: crate::data::clamp_to_millis(data.to_year),
            is_current: data.is_current,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YearUpdateData {
    pub name: Option<String>,
    pub from_year: Option<DateTime<Utc>>,
    pub to_year: Option<DateTime<Utc>>,
    pub is_current: Option<bool>,
}

impl YearUpdateData {
    pub fn into_update(self) -> Document {
        let mut set = doc! { "updated_at": bson::DateTime::now() };
        if let Some(name) = self.name {
            set.insert("name", name);
        }
        if let Some(from_year) = self.from_year {
            set.insert("from_year", bson::DateTime::from_chrono(from_year));
        }
        if let Some(to_year) = self.to_year {
            set.insert("to_year", bson::DateTime::from_chrono(to_year));
        }
        if let Some(is_current) = self.is_current {
            set.insert("is_current", is_current);
        }
        doc! { "$set": set }
    }
}

pub trait AcademicYearDbExt {
    async fn create_year(&self, data: YearCreateData) -> Result<AcademicYear, Problem>;

    async fn current_year(&self) -> Result<Option<AcademicYear>, Problem>;

    async fn update_year(
        &self,
        id: Uuid,
        patch: YearUpdateData,
    ) -> Result<Option<AcademicYear>, Problem>;

    async fn delete_year(&self, id: Uuid) -> Result<AcademicYear, Problem>;

    async fn list_years(&self, page: &PageQuery) -> Result<(Vec<AcademicYear>, u64), Problem>;
}

impl AcademicYearDbExt for Database {
    /// Creating a record with `is_current` first demotes every other record
    /// currently flagged, then inserts. The two writes are not wrapped in a
    /// transaction; concurrent "set current" calls can still race (see
    /// DESIGN.md), but a single call always converges to one current year.
    async fn create_year(&self, data: YearCreateData) -> Result<AcademicYear, Problem> {
        let years = self.collection::<AcademicYear>(YEAR_COLLECTION_NAME);

        let existing = years
            .find_one(filter::by_span(&data.from_year, &data.to_year), None)
            .await
            .map_err(Problem::from)?;
        if existing.is_some() {
            return Err(problem::already_exists());
        }

        let year = AcademicYear::from(data);
        if year.is_current {
            years
                .update_many(
                    filter::current_except(year.id),
                    doc! { "$set": { "is_current": false } },
                    None,
                )
                .await
                .map_err(Problem::from)?;
        }

        years
            .insert_one(&year, None)
            .await
            .map_err(Problem::from)?;

        Ok(year)
    }

    async fn current_year(&self) -> Result<Option<AcademicYear>, Problem> {
        self.collection::<AcademicYear>(YEAR_COLLECTION_NAME)
            .find_one(filter::current(), None)
            .await
            .map_err(Problem::from)
    }

    /// The target is resolved before any sibling is touched, so an unknown
    /// id leaves the collection untouched.
    async fn update_year(
        &self,
        id: Uuid,
        patch: YearUpdateData,
    ) -> Result<Option<AcademicYear>, Problem> {
        let years = self.collection::<AcademicYear>(YEAR_COLLECTION_NAME);

        if years
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)?
            .is_none()
        {
            return Ok(None);
        }

        if patch.is_current == Some(true) {
            years
                .update_many(
                    filter::current_except(id),
                    doc! { "$set": { "is_current": false } },
                    None,
                )
                .await
                .map_err(Problem::from)?;
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        years
            .find_one_and_update(filter::by_id(id), patch.into_update(), options)
            .await
            .map_err(Problem::from)
    }

    async fn delete_year(&self, id: Uuid) -> Result<AcademicYear, Problem> {
        let years = self.collection::<AcademicYear>(YEAR_COLLECTION_NAME);

        let year = years
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)?
            .ok_or_else(|| problem::not_found(id))?;

        if year.is_current {
            return Err(problem::current_year_locked());
        }

        years
            .delete_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)?;

        Ok(year)
    }

    async fn list_years(&self, page: &PageQuery) -> Result<(Vec<AcademicYear>, u64), Problem> {
        let years = self.collection::<AcademicYear>(YEAR_COLLECTION_NAME);
        let query = page
            .search
            .as_deref()
            .map(filter::name_search)
            .unwrap_or_default();

        let total = years
            .count_documents(query.clone(), None)
            .await
            .map_err(Problem::from)?;

        let options = FindOptions::builder()
            .sort(doc! { "name": 1 })
            .skip(page.skip())
            .limit(page.limit())
            .build();

        let mut cursor = years.find(query, options).await.map_err(Problem::from)?;
        let mut found = Vec::new();
        while let Some(year) = cursor.next().await {
            match year {
                Ok(year) => found.push(year),
                Err(e) => tracing::warn!("unable to deserialize academic year document: {}", e),
            }
        }

        Ok((found, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clearing_write_excludes_the_target() {
        let id = Uuid::new_v4();
        let query = filter::current_except(id);

        assert_eq!(query.get_bool("is_current").unwrap(), true);
        let ne = query
            .get_document("_id")
            .unwrap()
            .get("$ne")
            .expect("clearing filter must exclude the target id");
        assert_eq!(*ne, bson::Bson::from(bson::Uuid::from_uuid_1(id)));
    }

    #[test]
    fn span_filter_matches_storage_format() {
        let year: AcademicYear = YearCreateData {
            name: "2023/2024".into(),
            from_year: Utc::now(),
            to_year: Utc::now(),
            is_current: false,
        }
        .into();

        let stored = bson::to_document(&year).expect("year must serialize");
        let query = filter::by_span(&year.from_year, &year.to_year);

        // The duplicate check only works if the filter values serialize the
        // same way the model fields do.
        assert_eq!(stored.get("from_year"), query.get("from_year"));
        assert_eq!(stored.get("to_year"), query.get("to_year"));
    }

    #[test]
    fn timestamps_persist_as_native_datetimes() {
        let year: AcademicYear = YearCreateData {
            name: "2024/2025".into(),
            from_year: Utc::now(),
            to_year: Utc::now(),
            is_current: false,
        }
        .into();

        let stored = bson::to_document(&year).expect("year must serialize");

        // String-typed timestamps would make `created_at` sorts lexicographic.
        for field in ["from_year", "to_year", "created_at", "updated_at"] {
            assert!(
                matches!(stored.get(field), Some(bson::Bson::DateTime(_))),
                "{} must be stored as a BSON datetime",
                field
            );
        }
    }

    #[test]
    fn patch_includes_only_provided_fields() {
        let patch = YearUpdateData {
            is_current: Some(true),
            ..Default::default()
        };

        let update = patch.into_update();
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_bool("is_current").unwrap(), true);
        assert!(set.get("name").is_none());
        assert!(set.get("from_year").is_none());
        assert!(set.get("updated_at").is_some());
    }
}
