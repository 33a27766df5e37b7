use std::io::Cursor;

use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Implements [RFC7807](https://tools.ietf.org/html/rfc7807).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(skip, default = "default_status")]
    pub status: Status,
    pub type_uri: String,
    pub title: String,

    pub detail: Option<String>,

    pub body: Map<String, Value>,
}

fn default_status() -> Status {
    Status::InternalServerError
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            status: Status::InternalServerError,
            type_uri: "about:blank".to_string(),
            title: "Problem".to_string(),
            detail: None,
            body: Map::new(),
        }
    }
}

impl Problem {
    pub fn new_untyped(status: Status, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: "about:blank".to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn detail(&mut self, value: impl ToString) -> &mut Problem {
        self.detail = Some(value.to_string());
        self
    }

    pub fn insert<V: Serialize>(&mut self, key: impl ToString, value: V) -> &mut Problem {
        self.body.insert(
            key.to_string(),
            serde_json::to_value(value).expect("data must be JSON serializable"),
        );
        self
    }

    pub fn insert_str(&mut self, key: impl ToString, value: impl ToString) -> &mut Problem {
        self.body
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.title)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let mut body = self.body.clone();

        // Following are required by rfc7807
        body.insert(String::from("type"), serde_json::Value::from(self.type_uri));
        body.insert(String::from("title"), serde_json::Value::from(self.title));

        // Optional parameters as specified by rfc7807
        if self.detail.is_some() {
            body.insert(
                String::from("detail"),
                serde_json::Value::from(self.detail.unwrap()),
            );
        }
        body.insert(
            String::from("status"),
            serde_json::Value::from(self.status.code),
        );

        let body_string = serde_json::to_string(&body)
            .expect("JSON map keys and values must be JSON serializable");

        Response::build()
            .status(self.status)
            .header(ContentType::new("application", "problem+json"))
            .raw_header("Content-Language", "en")
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}

/// Shared error taxonomy. Entity-specific wrappers live in each
/// `data::<entity>::db::problem` module.
pub mod problems {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    /// Unique-key collision on an existing entity.
    #[inline]
    pub fn duplicate_entity(title: impl ToString) -> Problem {
        Problem::new_untyped(Status::Conflict, title)
    }

    /// An id or lookup key did not resolve.
    #[inline]
    pub fn not_found(title: impl ToString) -> Problem {
        Problem::new_untyped(Status::NotFound, title)
    }

    /// Operation violates a business invariant.
    #[inline]
    pub fn conflict(title: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, title)
    }

    /// Login failure. Deliberately identical for unknown email and wrong
    /// password so accounts can't be enumerated.
    #[inline]
    pub fn invalid_credentials() -> Problem {
        Problem::new_untyped(Status::BadRequest, "Invalid email or password.")
    }

    #[inline]
    pub fn unauthorized(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::Unauthorized, "Not authorized.")
            .detail(detail)
            .clone()
    }

    #[inline]
    pub fn role_not_allowed(role: crate::role::Role) -> Problem {
        Problem::new_untyped(
            Status::Unauthorized,
            format!("User role '{}' is not authorized to access this route.", role),
        )
    }
}

impl From<mongodb::error::Error> for Problem {
    fn from(e: mongodb::error::Error) -> Self {
        // Underlying store failures are not differentiated towards clients.
        tracing::error!("MongoDB failed while processing request: {}", e);
        Problem::new_untyped(Status::InternalServerError, "Server Error")
    }
}

impl From<bson::de::Error> for Problem {
    fn from(e: bson::de::Error) -> Self {
        tracing::error!("unable to process BSON data: {}", e);
        Problem::new_untyped(Status::InternalServerError, "Server Error")
    }
}

impl From<serde_json::Error> for Problem {
    fn from(_: serde_json::Error) -> Self {
        Problem::new_untyped(
            Status::InternalServerError,
            "An error occurred while processing JSON data.",
        )
    }
}

impl From<jsonwebtoken::errors::Error> for Problem {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.into_kind() {
            ErrorKind::ExpiredSignature => {
                Problem::new_untyped(Status::Unauthorized, "Expired session token.")
            }
            _ => Problem::new_untyped(Status::Unauthorized, "Error while handling session token."),
        }
    }
}

impl From<std::io::Error> for Problem {
    fn from(_: std::io::Error) -> Self {
        Problem::new_untyped(Status::InternalServerError, "Server IO error")
    }
}

#[cfg(test)]
mod tests {
    use super::problems;
    use rocket::http::Status;

    #[test]
    fn taxonomy_statuses() {
        assert_eq!(problems::duplicate_entity("dup").status, Status::Conflict);
        assert_eq!(problems::not_found("missing").status, Status::NotFound);
        assert_eq!(problems::conflict("locked").status, Status::BadRequest);
        assert_eq!(problems::invalid_credentials().status, Status::BadRequest);
        assert_eq!(
            problems::unauthorized("no cookie").status,
            Status::Unauthorized
        );
    }

    #[test]
    fn login_failures_share_one_shape() {
        // Unknown email and wrong password must be indistinguishable.
        assert_eq!(problems::invalid_credentials(), problems::invalid_credentials());
    }
}
