use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::data::activity::ActivityLogger;
use crate::data::class::db::problem as class_problem;
use crate::data::class::db::{ClassCreateData, ClassDbExt, ClassUpdateData};
use crate::data::class::ClassResponse;
use crate::middleware::paging::{PageQuery, Pagination};
use crate::resp::problem::Problem;
use crate::resp::session::AuthUser;
use crate::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassListResponse {
    pub classes: Vec<ClassResponse>,
    pub pagination: Pagination,
}

#[post("/create", format = "application/json", data = "<class>")]
#[tracing::instrument(skip(db, audit))]
pub async fn class_create(
    class: Json<ClassCreateData>,
    auth: AuthUser,
    db: &State<Database>,
    audit: &State<ActivityLogger>,
) -> Result<(Status, Json<ClassResponse>), Problem> {
    auth.require(&[Role::Admin])?;

    let created = db.create_class(class.into_inner()).await?;
    audit.record(auth.id(), format!("Created new class: {}", created.name), None);

    Ok((Status::Created, Json(ClassResponse::from(created))))
}

#[patch("/update/<id>", format = "application/json", data = "<patch>")]
#[tracing::instrument(skip(db, audit))]
pub async fn class_update(
    id: Uuid,
    patch: Json<ClassUpdateData>,
    auth: AuthUser,
    db: &State<Database>,
    audit: &State<ActivityLogger>,
) -> Result<Json<ClassResponse>, Problem> {
    auth.require(&[Role::Admin])?;

    let updated = db
        .update_class(id, patch.into_inner())
        .await?
        .ok_or_else(|| class_problem::not_found(id))?;

    audit.record(auth.id(), format!("Updated class: {}", id), None);

    Ok(Json(ClassResponse::from(updated)))
}

#[delete("/delete/<id>")]
#[tracing::instrument(skip(db, audit))]
pub async fn class_delete(
    id: Uuid,
    auth: AuthUser,
    db: &State<Database>,
    audit: &State<ActivityLogger>,
) -> Result<Json<Value>, Problem> {
    auth.require(&[Role::Admin])?;

    let removed = db
        .delete_class(id)
        .await?
        .ok_or_else(|| class_problem::not_found(id))?;

    audit.record(auth.id(), format!("Deleted class: {}", removed.name), None);

    Ok(Json(json!({ "message": "Class was removed" })))
}

#[get("/")]
#[tracing::instrument(skip(db))]
pub async fn class_list(
    auth: AuthUser,
    page: PageQuery,
    db: &State<Database>,
) -> Result<Json<ClassListResponse>, Problem> {
    auth.require(&[Role::Admin])?;

    let (classes, total) = db.list_classes(&page).await?;

    Ok(Json(ClassListResponse {
        classes: classes.into_iter().map(ClassResponse::from).collect(),
        pagination: Pagination::of(&page, total),
    }))
}
