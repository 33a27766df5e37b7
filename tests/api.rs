//! End-to-end API tests against a real MongoDB instance.
//!
//! These run only when `TEST_MONGODB_URI` is set (e.g.
//! `TEST_MONGODB_URI=mongodb://localhost:27017 cargo test`); without it each
//! test returns early so the suite stays green on machines without a
//! database.

use chrono::{DateTime, Duration, Utc};
use mongodb::Database;
use rocket::http::{ContentType, Cookie, Status};
use rocket::local::asynchronous::{Client, LocalResponse};
use serde_json::{json, Value};
use uuid::Uuid;

use academia_backend::data::user::db::{UserCreateData, UserDbExt};
use academia_backend::data::user::User;
use academia_backend::resp::session::SessionClaims;
use academia_backend::role::Role;

// Tests that flip the globally-unique current academic year serialize
// through this lock so they can't clobber each other's state.
static CURRENT_YEAR_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

async fn backend() -> Option<Client> {
    let uri = std::env::var("TEST_MONGODB_URI").ok()?;
    std::env::set_var("MONGODB_URI", &uri);
    std::env::set_var("MONGODB_DB_NAME", "academia_test");

    let rocket = academia_backend::create(None)
        .await
        .expect("invalid backend");
    Client::tracked(rocket).await.ok()
}

fn db(client: &Client) -> Database {
    client
        .rocket()
        .state::<Database>()
        .expect("database must be managed state")
        .clone()
}

async fn seed_user(db: &Database, role: Role) -> (User, Cookie<'static>) {
    let tag = Uuid::new_v4().simple().to_string();
    let user = db
        .register_user(UserCreateData {
            name: format!("Test {} {}", role, tag),
            email: format!("{}-{}@example.com", role, tag),
            password: "correct horse battery".to_string(),
            role,
            is_active: true,
            student_class: None,
            teacher_subject: None,
        })
        .await
        .expect("unable to seed test user");

    let cookie = SessionClaims::new(user.id)
        .cookie()
        .expect("unable to build session cookie");

    (user, cookie)
}

/// Spans are derived from the current instant so reruns against a persistent
/// test database never collide on the {from_year, to_year} unique pair.
fn unique_span(offset_ms: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = Utc::now() + Duration::milliseconds(offset_ms);
    (from, from + Duration::days(365))
}

async fn create_year<'c>(
    client: &'c Client,
    admin: &Cookie<'static>,
    name: &str,
    span: (DateTime<Utc>, DateTime<Utc>),
    is_current: bool,
) -> LocalResponse<'c> {
    client
        .post("/api/academic-year/create")
        .header(ContentType::JSON)
        .cookie(admin.clone())
        .body(
            json!({
                "name": name,
                "from_year": span.0,
                "to_year": span.1,
                "is_current": is_current,
            })
            .to_string(),
        )
        .dispatch()
        .await
}

#[rocket::async_test]
async fn health_endpoint_is_public() {
    let Some(client) = backend().await else { return };

    let response = client.get("/").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let body: Value = response.into_json().await.expect("invalid response json");
    assert_eq!(body["status"], "OK");
}

#[rocket::async_test]
async fn marking_a_year_current_demotes_the_previous_one() {
    let Some(client) = backend().await else { return };
    let _guard = CURRENT_YEAR_LOCK.lock().await;
    let (_, admin) = seed_user(&db(&client), Role::Admin).await;

    let prefix = format!("sy-{}", Uuid::new_v4().simple());

    let a = create_year(&client, &admin, &format!("{} A", prefix), unique_span(0), true).await;
    assert_eq!(a.status(), Status::Created);

    let b = create_year(&client, &admin, &format!("{} B", prefix), unique_span(7), true).await;
    assert_eq!(b.status(), Status::Created);
    let b_body: Value = b.into_json().await.expect("invalid response json");

    let current = client.get("/api/academic-year/current").dispatch().await;
    assert_eq!(current.status(), Status::Ok);
    let current_body: Value = current.into_json().await.expect("invalid response json");
    assert_eq!(current_body["id"], b_body["id"], "B must be the current year");

    // A was demoted when B claimed currency.
    let listed = client
        .get(format!("/api/academic-year?search={}", prefix))
        .cookie(admin.clone())
        .dispatch()
        .await;
    assert_eq!(listed.status(), Status::Ok);
    let listed: Value = listed.into_json().await.expect("invalid response json");
    let years = listed["years"].as_array().expect("years array");
    assert_eq!(years.len(), 2);
    for year in years {
        let expect_current = year["id"] == b_body["id"];
        assert_eq!(year["is_current"].as_bool(), Some(expect_current));
    }
}

#[rocket::async_test]
async fn current_year_cannot_be_deleted() {
    let Some(client) = backend().await else { return };
    let _guard = CURRENT_YEAR_LOCK.lock().await;
    let (_, admin) = seed_user(&db(&client), Role::Admin).await;

    let created = create_year(&client, &admin, "delete-guard", unique_span(13), true).await;
    assert_eq!(created.status(), Status::Created);
    let created: Value = created.into_json().await.expect("invalid response json");
    let id = created["id"].as_str().expect("year id").to_string();

    let deleted = client
        .delete(format!("/api/academic-year/delete/{}", id))
        .cookie(admin.clone())
        .dispatch()
        .await;
    assert_eq!(deleted.status(), Status::BadRequest);

    // The record is untouched and still current.
    let current = client.get("/api/academic-year/current").dispatch().await;
    let current: Value = current.into_json().await.expect("invalid response json");
    assert_eq!(current["id"].as_str(), Some(id.as_str()));
}

#[rocket::async_test]
async fn duplicate_year_span_is_rejected() {
    let Some(client) = backend().await else { return };
    let (_, admin) = seed_user(&db(&client), Role::Admin).await;

    let span = unique_span(29);
    let first = create_year(&client, &admin, "span-holder", span, false).await;
    assert_eq!(first.status(), Status::Created);

    let second = create_year(&client, &admin, "span-contender", span, false).await;
    assert_eq!(second.status(), Status::Conflict);
}

#[rocket::async_test]
async fn year_listing_paginates() {
    let Some(client) = backend().await else { return };
    let (_, admin) = seed_user(&db(&client), Role::Admin).await;

    let prefix = format!("pg-{}", Uuid::new_v4().simple());
    for i in 0..25i64 {
        let name = format!("{} {:02}", prefix, i);
        let created = create_year(&client, &admin, &name, unique_span(100 + i), false).await;
        assert_eq!(created.status(), Status::Created);
    }

    let response = client
        .get(format!(
            "/api/academic-year?page=2&limit=10&search={}",
            prefix
        ))
        .cookie(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let body: Value = response.into_json().await.expect("invalid response json");
    assert_eq!(body["years"].as_array().expect("years array").len(), 10);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["pages"], 3);
}

#[rocket::async_test]
async fn year_listing_requires_admin_role() {
    let Some(client) = backend().await else { return };
    let (_, student) = seed_user(&db(&client), Role::Student).await;

    let anonymous = client.get("/api/academic-year").dispatch().await;
    assert_eq!(anonymous.status(), Status::Unauthorized);

    let as_student = client
        .get("/api/academic-year")
        .cookie(student)
        .dispatch()
        .await;
    assert_eq!(as_student.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn login_failures_are_indistinguishable() {
    let Some(client) = backend().await else { return };
    let (user, _) = seed_user(&db(&client), Role::Teacher).await;

    let wrong_password = client
        .post("/api/users/login")
        .header(ContentType::JSON)
        .body(json!({ "email": user.email, "password": "not the password" }).to_string())
        .dispatch()
        .await;
    assert_eq!(wrong_password.status(), Status::BadRequest);
    let wrong_password: Value = wrong_password
        .into_json()
        .await
        .expect("invalid response json");

    let unknown_email = client
        .post("/api/users/login")
        .header(ContentType::JSON)
        .body(json!({ "email": "nobody@example.com", "password": "whatever" }).to_string())
        .dispatch()
        .await;
    assert_eq!(unknown_email.status(), Status::BadRequest);
    let unknown_email: Value = unknown_email
        .into_json()
        .await
        .expect("invalid response json");

    assert_eq!(wrong_password, unknown_email);
}

#[rocket::async_test]
async fn login_issues_session_cookie_and_profile_resolves() {
    let Some(client) = backend().await else { return };
    let (user, _) = seed_user(&db(&client), Role::Teacher).await;

    let login = client
        .post("/api/users/login")
        .header(ContentType::JSON)
        .body(json!({ "email": user.email, "password": "correct horse battery" }).to_string())
        .dispatch()
        .await;
    assert_eq!(login.status(), Status::Ok);
    assert!(
        login.cookies().get("session").is_some(),
        "session cookie wasn't set"
    );
    let login: Value = login.into_json().await.expect("invalid response json");
    assert!(
        login.get("pw_hash").is_none(),
        "response must not leak credentials"
    );

    // Tracked client carries the cookie forward.
    let profile = client.get("/api/users/profile").dispatch().await;
    assert_eq!(profile.status(), Status::Ok);
    let profile: Value = profile.into_json().await.expect("invalid response json");
    assert_eq!(profile["email"].as_str(), Some(user.email.as_str()));
}

#[rocket::async_test]
async fn class_name_is_unique_per_year() {
    let Some(client) = backend().await else { return };
    let (teacher, admin) = seed_user(&db(&client), Role::Admin).await;

    let year_x = create_year(&client, &admin, "class-year-x", unique_span(211), false).await;
    let year_x: Value = year_x.into_json().await.expect("invalid response json");
    let year_y = create_year(&client, &admin, "class-year-y", unique_span(223), false).await;
    let year_y: Value = year_y.into_json().await.expect("invalid response json");

    let name = format!("10A-{}", Uuid::new_v4().simple());
    let class_body = |year: &Value| {
        json!({
            "name": name,
            "academic_year": year["id"],
            "class_teacher": teacher.id,
            "capacity": 30,
        })
        .to_string()
    };

    let first = client
        .post("/api/classes/create")
        .header(ContentType::JSON)
        .cookie(admin.clone())
        .body(class_body(&year_x))
        .dispatch()
        .await;
    assert_eq!(first.status(), Status::Created);

    let duplicate = client
        .post("/api/classes/create")
        .header(ContentType::JSON)
        .cookie(admin.clone())
        .body(class_body(&year_x))
        .dispatch()
        .await;
    assert_eq!(duplicate.status(), Status::Conflict);

    // Same name in a different year is fine.
    let other_year = client
        .post("/api/classes/create")
        .header(ContentType::JSON)
        .cookie(admin.clone())
        .body(class_body(&year_y))
        .dispatch()
        .await;
    assert_eq!(other_year.status(), Status::Created);
}

#[rocket::async_test]
async fn user_listing_filters_by_role() {
    let Some(client) = backend().await else { return };
    let (_, admin) = seed_user(&db(&client), Role::Admin).await;
    seed_user(&db(&client), Role::Student).await;

    let response = client
        .get("/api/users?role=student&limit=5")
        .cookie(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let body: Value = response.into_json().await.expect("invalid response json");
    let users = body["users"].as_array().expect("users array");
    assert!(!users.is_empty());
    for user in users {
        assert_eq!(user["role"].as_str(), Some("student"));
    }
}

#[rocket::async_test]
async fn user_email_stays_unique_across_updates() {
    let Some(client) = backend().await else { return };
    let (holder, admin) = seed_user(&db(&client), Role::Admin).await;
    let (target, _) = seed_user(&db(&client), Role::Teacher).await;

    // Claiming another user's email is rejected.
    let stolen = client
        .put(format!("/api/users/update/{}", target.id))
        .header(ContentType::JSON)
        .cookie(admin.clone())
        .body(json!({ "email": holder.email }).to_string())
        .dispatch()
        .await;
    assert_eq!(stolen.status(), Status::Conflict);

    // Re-submitting the user's own email is not a collision.
    let unchanged = client
        .put(format!("/api/users/update/{}", target.id))
        .header(ContentType::JSON)
        .cookie(admin.clone())
        .body(json!({ "email": target.email, "name": "Renamed" }).to_string())
        .dispatch()
        .await;
    assert_eq!(unchanged.status(), Status::Ok);
    let unchanged: Value = unchanged.into_json().await.expect("invalid response json");
    assert_eq!(unchanged["name"], "Renamed");
    assert_eq!(unchanged["email"].as_str(), Some(target.email.as_str()));
}

#[rocket::async_test]
async fn logout_requires_a_session() {
    let Some(client) = backend().await else { return };

    let anonymous = client.post("/api/users/logout").dispatch().await;
    assert_eq!(anonymous.status(), Status::Unauthorized);

    let (_, teacher) = seed_user(&db(&client), Role::Teacher).await;
    let authed = client
        .post("/api/users/logout")
        .cookie(teacher)
        .dispatch()
        .await;
    assert_eq!(authed.status(), Status::Ok);
    let body: Value = authed.into_json().await.expect("invalid response json");
    assert_eq!(body["message"], "Logged out successfully");
}

#[rocket::async_test]
async fn year_update_applies_partial_patch() {
    let Some(client) = backend().await else { return };
    let (_, admin) = seed_user(&db(&client), Role::Admin).await;

    let created = create_year(&client, &admin, "patch-me", unique_span(307), false).await;
    let created: Value = created.into_json().await.expect("invalid response json");
    let id = created["id"].as_str().expect("year id");

    let patched = client
        .patch(format!("/api/academic-year/update/{}", id))
        .header(ContentType::JSON)
        .body(json!({ "name": "patched name" }).to_string())
        .dispatch()
        .await;
    assert_eq!(patched.status(), Status::Ok);

    let patched: Value = patched.into_json().await.expect("invalid response json");
    assert_eq!(patched["name"], "patched name");
    assert_eq!(patched["from_year"], created["from_year"]);
    assert_eq!(patched["is_current"], false);
}

#[rocket::async_test]
async fn updating_a_missing_year_leaves_siblings_alone() {
    let Some(client) = backend().await else { return };
    let _guard = CURRENT_YEAR_LOCK.lock().await;
    let (_, admin) = seed_user(&db(&client), Role::Admin).await;

    let created = create_year(&client, &admin, "stay-current", unique_span(401), true).await;
    assert_eq!(created.status(), Status::Created);
    let created: Value = created.into_json().await.expect("invalid response json");

    let missing = client
        .patch(format!("/api/academic-year/update/{}", Uuid::new_v4()))
        .header(ContentType::JSON)
        .body(json!({ "is_current": true }).to_string())
        .dispatch()
        .await;
    assert_eq!(missing.status(), Status::NotFound);

    let current = client.get("/api/academic-year/current").dispatch().await;
    assert_eq!(current.status(), Status::Ok);
    let current: Value = current.into_json().await.expect("invalid response json");
    assert_eq!(current["id"], created["id"]);
}

#[rocket::async_test]
async fn audit_trail_is_visible_to_staff() {
    let Some(client) = backend().await else { return };
    let (_, admin) = seed_user(&db(&client), Role::Admin).await;

    let name = format!("audited-{}", Uuid::new_v4().simple());
    let created = create_year(&client, &admin, &name, unique_span(509), false).await;
    assert_eq!(created.status(), Status::Created);

    // The sink is asynchronous; give the drain task a moment.
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;

    let response = client
        .get("/api/activities?limit=50")
        .cookie(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let body: Value = response.into_json().await.expect("invalid response json");
    let logs = body["logs"].as_array().expect("logs array");
    let action = format!("Created academic year {}", name);
    assert!(
        logs.iter().any(|log| log["action"] == action.as_str()),
        "expected audit entry '{}'",
        action
    );
}
