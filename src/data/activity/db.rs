use std::collections::HashMap;

use bson::{doc, Bson};
use chrono::{DateTime, Utc};
use mongodb::options::FindOptions;
use mongodb::Database;
use rocket::futures::StreamExt;
use uuid::Uuid;

use crate::data::user::{User, USER_COLLECTION_NAME};
use crate::middleware::paging::PageQuery;
use crate::resp::problem::Problem;
use crate::role::Role;

use super::{ActivityLog, ACTIVITY_COLLECTION_NAME};

/// Acting user's public identity, embedded in listed audit entries. `None`
/// when the actor has since been deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorInfo {
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for ActorInfo {
    fn from(user: &User) -> Self {
        ActorInfo {
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub user: Option<ActorInfo>,
    pub action: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub trait ActivityDbExt {
    async fn list_activities(
        &self,
        page: &PageQuery,
    ) -> Result<(Vec<ActivityEntry>, u64), Problem>;
}

impl ActivityDbExt for Database {
    async fn list_activities(
        &self,
        page: &PageQuery,
    ) -> Result<(Vec<ActivityEntry>, u64), Problem> {
        let logs = self.collection::<ActivityLog>(ACTIVITY_COLLECTION_NAME);

        let total = logs
            .count_documents(None, None)
            .await
            .map_err(Problem::from)?;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(page.skip())
            .limit(page.limit())
            .build();

        let mut cursor = logs.find(None, options).await.map_err(Problem::from)?;
        let mut found: Vec<ActivityLog> = Vec::new();
        while let Some(log) = cursor.next().await {
            match log {
                Ok(log) => found.push(log),
                Err(e) => tracing::warn!("unable to deserialize activity log document: {}", e),
            }
        }

        let actors = self.resolve_actors(&found).await?;
        let entries = found
            .into_iter()
            .map(|log| ActivityEntry {
                id: log.id,
                user: actors.get(&log.user).cloned(),
                action: log.action,
                details: log.details,
                created_at: log.created_at,
            })
            .collect();

        Ok((entries, total))
    }
}

trait ResolveActorsExt {
    async fn resolve_actors(&self, logs: &[ActivityLog])
        -> Result<HashMap<Uuid, ActorInfo>, Problem>;
}

impl ResolveActorsExt for Database {
    async fn resolve_actors(
        &self,
        logs: &[ActivityLog],
    ) -> Result<HashMap<Uuid, ActorInfo>, Problem> {
        let ids: Vec<Bson> = {
            let mut seen: Vec<Uuid> = logs.iter().map(|log| log.user).collect();
            seen.sort_unstable();
            seen.dedup();
            seen.into_iter()
                .map(|id| Bson::from(bson::Uuid::from_uuid_1(id)))
                .collect()
        };

        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut cursor = self
            .collection::<User>(USER_COLLECTION_NAME)
            .find(doc! { "_id": { "$in": ids } }, None)
            .await
            .map_err(Problem::from)?;

        let mut actors = HashMap::new();
        while let Some(user) = cursor.next().await {
            match user {
                Ok(user) => {
                    actors.insert(user.id, ActorInfo::from(&user));
                }
                Err(e) => tracing::warn!("unable to deserialize user document: {}", e),
            }
        }

        Ok(actors)
    }
}
