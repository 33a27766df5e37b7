use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;

use crate::data::activity::db::{ActivityDbExt, ActivityEntry};
use crate::middleware::paging::{PageQuery, Pagination};
use crate::resp::problem::Problem;
use crate::resp::session::AuthUser;
use crate::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityListResponse {
    pub logs: Vec<ActivityEntry>,
    pub pagination: Pagination,
}

#[get("/")]
#[tracing::instrument(skip(db))]
pub async fn activity_list(
    auth: AuthUser,
    page: PageQuery,
    db: &State<Database>,
) -> Result<Json<ActivityListResponse>, Problem> {
    auth.require(&[Role::Admin, Role::Teacher])?;

    let (logs, total) = db.list_activities(&page).await?;

    Ok(Json(ActivityListResponse {
        logs,
        pagination: Pagination::of(&page, total),
    }))
}
