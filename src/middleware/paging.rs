use std::convert::Infallible;

use rocket::request::{FromRequest, Outcome, Request};

/// Paging parameters shared by every listing endpoint. Pages are 1-based;
/// out-of-range values fall back to the defaults instead of erroring.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PageQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
}

impl Default for PageQuery {
    fn default() -> Self {
        PageQuery {
            page: 1,
            limit: 10,
            search: None,
        }
    }
}

impl PageQuery {
    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PageQuery {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let page: Option<u32> = request.query_value("page").and_then(|it| it.ok());
        let limit: Option<u32> = request.query_value("limit").and_then(|it| it.ok());
        let search: Option<String> = request
            .query_value("search")
            .and_then(|it| it.ok())
            .filter(|it: &String| !it.is_empty());

        let defaults = PageQuery::default();
        Outcome::Success(PageQuery {
            page: page.filter(|p| *p > 0).unwrap_or(defaults.page),
            limit: limit.filter(|l| *l > 0).unwrap_or(defaults.limit),
            search,
        })
    }
}

/// Paging summary included in listing responses.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
}

impl Pagination {
    pub fn of(query: &PageQuery, total: u64) -> Pagination {
        let limit = u64::from(query.limit);
        Pagination {
            page: query.page,
            pages: ((total + limit - 1) / limit) as u32,
        }
    }
}
