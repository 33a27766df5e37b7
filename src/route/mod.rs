use rocket::serde::json::Json;
use rocket::{Build, Rocket};
use serde_json::{json, Value};

pub mod activities;
pub mod classes;
pub mod users;
pub mod years;

#[get("/")]
pub fn health() -> Json<Value> {
    Json(json!({ "status": "OK", "message": "Server is healthy" }))
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", routes![health])
        .mount(
            "/api/users",
            routes![
                users::user_register,
                users::user_login,
                users::user_logout,
                users::user_profile,
                users::user_update,
                users::user_delete,
                users::user_list,
            ],
        )
        .mount(
            "/api/academic-year",
            routes![
                years::year_create,
                years::year_current,
                years::year_update,
                years::year_delete,
                years::year_list,
            ],
        )
        .mount(
            "/api/classes",
            routes![
                classes::class_create,
                classes::class_update,
                classes::class_delete,
                classes::class_list,
            ],
        )
        .mount("/api/activities", routes![activities::activity_list])
}
