use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::data::activity::ActivityLogger;
use crate::data::year::db::problem as year_problem;
use crate::data::year::db::{AcademicYearDbExt, YearCreateData, YearUpdateData};
use crate::data::year::YearResponse;
use crate::middleware::paging::{PageQuery, Pagination};
use crate::resp::problem::Problem;
use crate::resp::session::AuthUser;
use crate::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearListResponse {
    pub years: Vec<YearResponse>,
    pub pagination: Pagination,
}

#[post("/create", format = "application/json", data = "<year>")]
#[tracing::instrument(skip(db, audit))]
pub async fn year_create(
    year: Json<YearCreateData>,
    auth: AuthUser,
    db: &State<Database>,
    audit: &State<ActivityLogger>,
) -> Result<(Status, Json<YearResponse>), Problem> {
    auth.require(&[Role::Admin])?;

    let created = db.create_year(year.into_inner()).await?;
    audit.record(
        auth.id(),
        format!("Created academic year {}", created.name),
        None,
    );

    Ok((Status::Created, Json(YearResponse::from(created))))
}

#[get("/current")]
#[tracing::instrument(skip(db))]
pub async fn year_current(db: &State<Database>) -> Result<Json<YearResponse>, Problem> {
    db.current_year()
        .await?
        .map(|year| Json(YearResponse::from(year)))
        .ok_or_else(year_problem::no_current_year)
}

// No auth requirement here, mirroring the source system's exposed update
// route. The audit entry is only written when a session is present.
#[patch("/update/<id>", format = "application/json", data = "<patch>")]
#[tracing::instrument(skip(db, audit))]
pub async fn year_update(
    id: Uuid,
    patch: Json<YearUpdateData>,
    auth: Option<AuthUser>,
    db: &State<Database>,
    audit: &State<ActivityLogger>,
) -> Result<Json<YearResponse>, Problem> {
    let updated = db
        .update_year(id, patch.into_inner())
        .await?
        .ok_or_else(|| year_problem::not_found(id))?;

    if let Some(auth) = auth {
        audit.record(
            auth.id(),
            format!("Updated academic year {}", updated.name),
            None,
        );
    }

    Ok(Json(YearResponse::from(updated)))
}

#[delete("/delete/<id>")]
#[tracing::instrument(skip(db, audit))]
pub async fn year_delete(
    id: Uuid,
    auth: AuthUser,
    db: &State<Database>,
    audit: &State<ActivityLogger>,
) -> Result<Json<Value>, Problem> {
    auth.require(&[Role::Admin])?;

    let removed = db.delete_year(id).await?;
    audit.record(
        auth.id(),
        format!("Deleted academic year {}", removed.name),
        None,
    );

    Ok(Json(json!({ "message": "Academic year deleted successfully" })))
}

#[get("/")]
#[tracing::instrument(skip(db))]
pub async fn year_list(
    auth: AuthUser,
    page: PageQuery,
    db: &State<Database>,
) -> Result<Json<YearListResponse>, Problem> {
    auth.require(&[Role::Admin])?;

    let (years, total) = db.list_years(&page).await?;

    Ok(Json(YearListResponse {
        years: years.into_iter().map(YearResponse::from).collect(),
        pagination: Pagination::of(&page, total),
    }))
}
