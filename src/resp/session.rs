use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::outcome::Outcome::{Error, Success};
use rocket::request::{self, FromRequest, Request};
use rocket::time::OffsetDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::util::date_time_as_unix_seconds;
use crate::data::user::db::UserDbExt;
use crate::data::user::User;
use crate::resp::problem::Problem;
use crate::role::Role;

pub static SESSION_COOKIE_NAME: &str = "session";

/// Signed session credential carried by the `session` cookie. Only the user
/// id is encoded; the full user record is resolved from the store on each
/// protected request so role changes take effect immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(with = "date_time_as_unix_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    exp: DateTime<Utc>,
    pub user: Uuid,
}

impl SessionClaims {
    pub fn new(user: Uuid) -> SessionClaims {
        let now = Utc::now();
        SessionClaims {
            iat: now,
            exp: now + Duration::weeks(1),
            user,
        }
    }

    pub fn encode_jwt(&self) -> Result<String, jsonwebtoken::errors::Error> {
        let key = EncodingKey::from_secret(&crate::SECURITY.jwt_secret);
        encode(&Header::new(Algorithm::HS256), &self, &key)
    }

    pub fn cookie(&self) -> Result<Cookie<'static>, jsonwebtoken::errors::Error> {
        Ok(Cookie::build((SESSION_COOKIE_NAME, self.encode_jwt()?))
            .expires(OffsetDateTime::from_unix_timestamp(self.exp.timestamp()).ok())
            .path("/")
            .http_only(true)
            .build())
    }

    #[cfg(test)]
    pub fn expired(user: Uuid) -> SessionClaims {
        let then = Utc::now() - Duration::weeks(2);
        SessionClaims {
            iat: then,
            exp: then + Duration::weeks(1),
            user,
        }
    }
}

pub fn auth_problem(detail: impl ToString) -> Problem {
    super::problem::problems::unauthorized(detail)
}

pub fn extract_claims(cookies: &CookieJar) -> Result<SessionClaims, Problem> {
    let auth_cookie = cookies.get(SESSION_COOKIE_NAME);
    let token = match auth_cookie {
        Some(session) => session.value().to_owned(),
        None => {
            return Err(auth_problem("No session cookie."));
        }
    };
    tracing::debug!("extracted session token from cookie");

    decode::<SessionClaims>(
        &token,
        &DecodingKey::from_secret(&crate::SECURITY.jwt_secret),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| auth_problem("Session cookie was malformed or expired."))
}

/// Request guard holding the authenticated user, resolved from the store.
/// Handlers perform their own role checks via [`AuthUser::require`].
#[derive(Clone)]
pub struct AuthUser(pub User);

impl std::fmt::Debug for AuthUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthUser:{}({})", self.0.id, self.0.role)
    }
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn require(&self, allowed: &[Role]) -> Result<(), Problem> {
        if allowed.contains(&self.0.role) {
            Ok(())
        } else {
            Err(super::problem::problems::role_not_allowed(self.0.role))
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        tracing::trace!("extracting session claims from request cookies");
        let claims = match extract_claims(req.cookies()) {
            Ok(it) => it,
            Err(e) => {
                tracing::debug!("unable to extract claims from cookies");
                return Error((Status::Unauthorized, e));
            }
        };

        let db: &mongodb::Database = req
            .rocket()
            .state()
            .expect("MongoDB database must be managed state");

        match db.get_user(claims.user).await {
            Ok(Some(user)) => Success(AuthUser(user)),
            Ok(None) => Error((
                Status::Unauthorized,
                auth_problem("Session user no longer exists."),
            )),
            Err(e) => Error((Status::InternalServerError, e)),
        }
    }
}
