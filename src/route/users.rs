use mongodb::Database;
use rocket::http::{Cookie, CookieJar, Status};
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::data::user::db::problem as user_problem;
use crate::data::user::db::{UserCreateData, UserDbExt, UserLoginData, UserUpdateData};
use crate::data::user::UserResponse;
use crate::middleware::paging::{PageQuery, Pagination};
use crate::resp::problem::Problem;
use crate::resp::session::{AuthUser, SessionClaims, SESSION_COOKIE_NAME};
use crate::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreatedResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub pagination: Pagination,
}

#[post("/register", format = "application/json", data = "<user>")]
#[tracing::instrument(skip(db))]
pub async fn user_register(
    user: Json<UserCreateData>,
    auth: AuthUser,
    db: &State<Database>,
) -> Result<(Status, Json<UserCreatedResponse>), Problem> {
    auth.require(&[Role::Admin, Role::Teacher])?;

    let created = db.register_user(user.into_inner()).await?;

    Ok((
        Status::Created,
        Json(UserCreatedResponse {
            user: UserResponse::from(created),
            message: "User created successfully".to_string(),
        }),
    ))
}

#[post("/login", format = "application/json", data = "<login>")]
#[tracing::instrument(skip(db, cookies))]
pub async fn user_login<'a>(
    login: Json<UserLoginData>,
    cookies: &'a CookieJar<'_>,
    db: &State<Database>,
) -> Result<Json<UserResponse>, Problem> {
    let login = login.into_inner();

    // Unknown email and wrong password take the same exit so accounts
    // can't be enumerated.
    let user = db
        .find_user_by_email(&login.email)
        .await?
        .ok_or_else(user_problem::invalid_credentials)?;

    if !user.pw_hash.verify(&login.password) {
        return Err(user_problem::invalid_credentials());
    }

    let claims = SessionClaims::new(user.id);
    cookies.add(claims.cookie()?);

    Ok(Json(UserResponse::from(user)))
}

#[post("/logout")]
pub async fn user_logout(_auth: AuthUser, cookies: &CookieJar<'_>) -> Json<Value> {
    cookies.remove(Cookie::build(SESSION_COOKIE_NAME).path("/"));
    Json(json!({ "message": "Logged out successfully" }))
}

#[get("/profile")]
#[tracing::instrument]
pub async fn user_profile(auth: AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(auth.0))
}

#[put("/update/<id>", format = "application/json", data = "<patch>")]
#[tracing::instrument(skip(db))]
pub async fn user_update(
    id: Uuid,
    patch: Json<UserUpdateData>,
    auth: AuthUser,
    db: &State<Database>,
) -> Result<Json<UserResponse>, Problem> {
    auth.require(&[Role::Admin, Role::Teacher])?;

    let updated = db
        .update_user(id, patch.into_inner())
        .await?
        .ok_or_else(|| user_problem::not_found(id))?;

    Ok(Json(UserResponse::from(updated)))
}

#[delete("/delete/<id>")]
#[tracing::instrument(skip(db))]
pub async fn user_delete(
    id: Uuid,
    auth: AuthUser,
    db: &State<Database>,
) -> Result<Json<Value>, Problem> {
    auth.require(&[Role::Admin, Role::Teacher])?;

    db.delete_user(id)
        .await?
        .ok_or_else(|| user_problem::not_found(id))?;

    Ok(Json(json!({ "message": "User deleted successfully" })))
}

#[get("/?<role>")]
#[tracing::instrument(skip(db))]
pub async fn user_list(
    role: Option<Role>,
    auth: AuthUser,
    page: PageQuery,
    db: &State<Database>,
) -> Result<Json<UserListResponse>, Problem> {
    auth.require(&[Role::Admin, Role::Teacher])?;

    let (users, total) = db.list_users(role, &page).await?;

    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
        pagination: Pagination::of(&page, total),
    }))
}
