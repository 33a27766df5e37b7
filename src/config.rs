use crate::error::ConfigurationError;
use std::env;

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or("academia".to_string())
}

fn client_origin() -> Option<String> {
    env::var("CLIENT_URL").ok().filter(|it| !it.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,

    /// Origin allowed to make credentialed cross-origin requests. `None`
    /// allows any origin.
    pub client_origin: Option<String>,

    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigurationError::InvalidPort(raw))?,
            Err(_) => 8000,
        };

        Ok(Config {
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            client_origin: client_origin(),
            port,
        })
    }
}
