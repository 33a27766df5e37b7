use std::convert::TryInto;
use std::path::PathBuf;
use std::{env, fs};

const PASSWORD_SALT: &str = "password.salt";
const SESSION_SECRET: &str = "session.secret";

pub type Salt = [u8; 16];

/// Instance-wide secrets: the password hashing salt and the session token
/// signing secret. Both are loaded from `SECURITY_DIR` and generated on
/// first start when missing; `JWT_SECRET` overrides the secret file.
#[derive(Debug, Clone)]
pub struct Security {
    pub salt: Salt,
    pub jwt_secret: Vec<u8>,
}

#[inline]
fn security_dir() -> PathBuf {
    PathBuf::from(env::var("SECURITY_DIR").unwrap_or("./security".to_string()))
}

impl Security {
    pub fn load() -> Security {
        let dir = security_dir();

        fs::create_dir_all(dir.clone())
            .expect("unable to create directory for storing security information");

        tracing::info!("Loading password salt...");
        let mut salt: Option<Salt> = fs::read(dir.join(PASSWORD_SALT))
            .map(|s| s.try_into().ok())
            .ok()
            .flatten();

        match salt {
            None => {
                tracing::info!(
                    "Salt not found in '{}'. Generating a new password salt.",
                    dir.join(PASSWORD_SALT).display()
                );
                salt = Some(rand::random());

                fs::write(dir.join(PASSWORD_SALT), salt.unwrap()).expect("unable to write salt");
            }
            Some(_) => tracing::info!("Salt found and loaded."),
        }

        tracing::info!("Loading session signing secret...");
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => match fs::read(dir.join(SESSION_SECRET)) {
                Ok(bytes) if !bytes.is_empty() => bytes,
                _ => {
                    tracing::info!(
                        "Session secret not found in '{}'. Generating a new one.",
                        dir.join(SESSION_SECRET).display()
                    );
                    let generated: [u8; 32] = rand::random();

                    fs::write(dir.join(SESSION_SECRET), generated)
                        .expect("unable to write session secret");
                    generated.to_vec()
                }
            },
        };

        Security {
            salt: salt.unwrap(),
            jwt_secret,
        }
    }
}
