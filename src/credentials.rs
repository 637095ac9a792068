use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Last successful email sign-in, cached so the next start skips the prompt
#[derive(Serialize, Deserialize, Clone)]
pub struct Credentials {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Self {
        Credentials {
            email: email.to_string(),
            password: Some(BASE64.encode(password)),
        }
    }

    pub fn get_password(&self) -> Option<Zeroizing<String>> {
        let encoded = self.password.as_ref()?;
        let bytes = BASE64.decode(encoded).ok()?;
        String::from_utf8(bytes).ok().map(Zeroizing::new)
    }
}

fn credentials_path(dir: &Path) -> PathBuf {
    dir.join(CREDENTIALS_FILE)
}

pub fn save_credentials(dir: &Path, credentials: &Credentials) -> Result<()> {
    let file = File::create(credentials_path(dir))?;
    serde_json::to_writer_pretty(file, credentials)?;

    info!("Credentials saved for {}", credentials.email);
    Ok(())
}

pub fn load_credentials(dir: &Path) -> Result<Option<Credentials>> {
    let path = credentials_path(dir);
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path)?;
    let credentials: Credentials = serde_json::from_str(&contents)?;
    info!("Loaded credentials for {} from {}", credentials.email, path.display());

    Ok(Some(credentials))
}

pub fn clear_credentials(dir: &Path) -> Result<()> {
    let path = credentials_path(dir);
    if path.exists() {
        fs::remove_file(&path)?;
        info!("Removed cached credentials");
    }
    Ok(())
}
