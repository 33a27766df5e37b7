use bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::StreamExt;
use uuid::Uuid;

use crate::middleware::paging::PageQuery;
use crate::resp::problem::Problem;
use crate::role::Role;

use super::{PasswordHash, User, USER_COLLECTION_NAME};

pub mod problem {
    use crate::resp::problem::{problems, Problem};
    use uuid::Uuid;

    #[inline]
    pub fn already_exists(email: impl ToString) -> Problem {
        problems::duplicate_entity("User already exists.")
            .insert_str("email", email)
            .to_owned()
    }

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        problems::not_found("User not found.")
            .insert_str("id", id)
            .to_owned()
    }

    #[inline]
    pub fn invalid_credentials() -> Problem {
        problems::invalid_credentials()
    }
}

pub mod filter {
    use bson::{doc, Document};
    use uuid::Uuid;

    use crate::data::ci_regex;
    use crate::role::Role;

    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": bson::Uuid::from_uuid_1(id) }
    }

    pub fn by_email(email: &str) -> Document {
        doc! { "email": email }
    }

    /// Uniqueness probe for updates: any *other* user holding the email.
    pub fn email_except(email: &str, id: Uuid) -> Document {
        doc! {
            "email": email,
            "_id": { "$ne": bson::Uuid::from_uuid_1(id) },
        }
    }

    /// Role filter plus case-insensitive substring search over name and email.
    pub fn listing(role: Option<Role>, search: Option<&str>) -> Document {
        let mut query = Document::new();
        if let Some(role) = role {
            query.insert(
                "role",
                bson::to_bson(&role).expect("Role must be serializable to BSON"),
            );
        }
        if let Some(needle) = search {
            query.insert(
                "$or",
                vec![
                    doc! { "name": ci_regex(needle) },
                    doc! { "email": ci_regex(needle) },
                ],
            );
        }
        query
    }
}

#[derive(Clone, Deserialize)]
pub struct UserCreateData {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default = "super::default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub student_class: Option<Uuid>,
    #[serde(default)]
    pub teacher_subject: Option<Uuid>,
}

impl std::fmt::Debug for UserCreateData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserCreateData:{}", self.email)
    }
}

impl From<UserCreateData> for User {
    fn from(data: UserCreateData) -> Self {
        let now = crate::data::now_millis();
        User {
            id: Uuid::new_v4(),
            name: data.name,
            email: data.email,
            pw_hash: PasswordHash::new(data.password),
            role: data.role,
            is_active: data.is_active,
            student_class: data.student_class,
            teacher_subject: data.teacher_subject,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct UserLoginData {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for UserLoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserLoginData:{}", self.email)
    }
}

/// Field-level patch; only provided fields overwrite stored ones. A provided
/// password is re-hashed before persisting.
#[derive(Clone, Default, Deserialize)]
pub struct UserUpdateData {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub student_class: Option<Uuid>,
    pub teacher_subject: Option<Uuid>,
}

impl std::fmt::Debug for UserUpdateData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserUpdateData")
    }
}

impl UserUpdateData {
    pub fn into_update(self) -> Document {
        let mut set = doc! { "updated_at": bson::DateTime::now() };
        if let Some(name) = self.name {
            set.insert("name", name);
        }
        if let Some(email) = self.email {
            set.insert("email", email);
        }
        if let Some(password) = self.password {
            set.insert(
                "pw_hash",
                bson::to_bson(&PasswordHash::new(password))
                    .expect("PasswordHash must be serializable to BSON"),
            );
        }
        if let Some(role) = self.role {
            set.insert(
                "role",
                bson::to_bson(&role).expect("Role must be serializable to BSON"),
            );
        }
        if let Some(is_active) = self.is_active {
            set.insert("is_active", is_active);
        }
        if let Some(student_class) = self.student_class {
            set.insert(
                "student_class",
                bson::to_bson(&student_class).expect("Uuid must be serializable to BSON"),
            );
        }
        if let Some(teacher_subject) = self.teacher_subject {
            set.insert(
                "teacher_subject",
                bson::to_bson(&teacher_subject).expect("Uuid must be serializable to BSON"),
            );
        }
        doc! { "$set": set }
    }
}

pub trait UserDbExt {
    async fn register_user(&self, data: UserCreateData) -> Result<User, Problem>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Problem>;
    async fn find_user_by_email(&self, email: impl AsRef<str>) -> Result<Option<User>, Problem>;

    async fn update_user(&self, id: Uuid, patch: UserUpdateData)
        -> Result<Option<User>, Problem>;
    async fn delete_user(&self, id: Uuid) -> Result<Option<User>, Problem>;

    async fn list_users(
        &self,
        role: Option<Role>,
        page: &PageQuery,
    ) -> Result<(Vec<User>, u64), Problem>;
}

impl UserDbExt for Database {
    async fn register_user(&self, data: UserCreateData) -> Result<User, Problem> {
        if self.find_user_by_email(&data.email).await?.is_some() {
            return Err(problem::already_exists(&data.email));
        }

        let user = User::from(data);
        self.collection::<User>(USER_COLLECTION_NAME)
            .insert_one(&user, None)
            .await
            .map_err(Problem::from)?;

        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Problem> {
        self.collection::<User>(USER_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn find_user_by_email(&self, email: impl AsRef<str>) -> Result<Option<User>, Problem> {
        self.collection::<User>(USER_COLLECTION_NAME)
            .find_one(filter::by_email(email.as_ref()), None)
            .await
            .map_err(Problem::from)
    }

    /// A patched email is re-checked for uniqueness against every other user
    /// before anything is written.
    async fn update_user(
        &self,
        id: Uuid,
        patch: UserUpdateData,
    ) -> Result<Option<User>, Problem> {
        let users = self.collection::<User>(USER_COLLECTION_NAME);

        if let Some(email) = patch.email.as_deref() {
            if users
                .find_one(filter::email_except(email, id), None)
                .await
                .map_err(Problem::from)?
                .is_some()
            {
                return Err(problem::already_exists(email));
            }
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        users
            .find_one_and_update(filter::by_id(id), patch.into_update(), options)
            .await
            .map_err(Problem::from)
    }

    async fn delete_user(&self, id: Uuid) -> Result<Option<User>, Problem> {
        self.collection::<User>(USER_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn list_users(
        &self,
        role: Option<Role>,
        page: &PageQuery,
    ) -> Result<(Vec<User>, u64), Problem> {
        let users = self.collection::<User>(USER_COLLECTION_NAME);
        let query = filter::listing(role, page.search.as_deref());

        let total = users
            .count_documents(query.clone(), None)
            .await
            .map_err(Problem::from)?;

        let options = FindOptions::builder()
            .sort(doc! { "name": 1 })
            .skip(page.skip())
            .limit(page.limit())
            .build();

        let mut cursor = users.find(query, options).await.map_err(Problem::from)?;
        let mut found = Vec::new();
        while let Some(user) = cursor.next().await {
            match user {
                Ok(user) => found.push(user),
                Err(e) => tracing::warn!("unable to deserialize user document: {}", e),
            }
        }

        Ok((found, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_filter_combines_role_and_search() {
        let query = filter::listing(Some(Role::Teacher), Some("ada"));
        assert_eq!(query.get_str("role").unwrap(), "teacher");
        assert!(query.get_array("$or").unwrap().len() == 2);

        let unfiltered = filter::listing(None, None);
        assert!(unfiltered.is_empty());
    }

    #[test]
    fn email_probe_excludes_self() {
        let id = Uuid::new_v4();
        let query = filter::email_except("taken@example.com", id);

        assert_eq!(query.get_str("email").unwrap(), "taken@example.com");
        let ne = query
            .get_document("_id")
            .unwrap()
            .get("$ne")
            .expect("probe must exclude the user being updated");
        assert_eq!(*ne, bson::Bson::from(bson::Uuid::from_uuid_1(id)));
    }

    #[test]
    fn update_patch_only_sets_provided_fields() {
        let patch = UserUpdateData {
            name: Some("New Name".into()),
            ..Default::default()
        };

        let update = patch.into_update();
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("name").unwrap(), "New Name");
        assert!(set.get("email").is_none());
        assert!(set.get("pw_hash").is_none());
        assert!(set.get("updated_at").is_some());
    }

    #[test]
    fn update_patch_rehashes_password() {
        let patch = UserUpdateData {
            password: Some("fresh-secret".into()),
            ..Default::default()
        };

        let set = patch.into_update().get_document("$set").unwrap().clone();
        let hash: PasswordHash =
            bson::from_bson(set.get("pw_hash").unwrap().clone()).expect("stored hash is valid");
        assert!(hash.verify("fresh-secret"));
    }
}
