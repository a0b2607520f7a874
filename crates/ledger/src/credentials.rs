use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const AUTHORIZED_USER_TYPE: &str = "authorized_user";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("could not read credential file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse credential file `{path}`: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("could not write credential file `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("credential file `{path}` is missing `{field}`; run `musicshare sheets-auth` again")]
    Incomplete { path: PathBuf, field: &'static str },
}

/// On-disk shape, compatible with Google's `authorized_user` credential JSON.
#[derive(Debug, Deserialize, Serialize)]
struct CredentialFile {
    #[serde(rename = "type", default = "authorized_user_type")]
    kind: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

fn authorized_user_type() -> String {
    AUTHORIZED_USER_TYPE.to_owned()
}

/// Long-lived spreadsheet grant: OAuth client plus the refresh token the user consented to.
#[derive(Clone, Debug)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
}

impl AuthorizedUser {
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CredentialError::Read { path: path.to_path_buf(), source })?;
        let file: CredentialFile = serde_json::from_str(&raw)
            .map_err(|source| CredentialError::Parse { path: path.to_path_buf(), source })?;

        let require = |value: String, field: &'static str| {
            if value.trim().is_empty() {
                Err(CredentialError::Incomplete { path: path.to_path_buf(), field })
            } else {
                Ok(value)
            }
        };

        Ok(Self {
            client_id: require(file.client_id, "client_id")?,
            client_secret: require(file.client_secret, "client_secret")?.into(),
            refresh_token: require(file.refresh_token, "refresh_token")?.into(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), CredentialError> {
        let file = CredentialFile {
            kind: authorized_user_type(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.expose_secret().to_owned(),
            refresh_token: self.refresh_token.expose_secret().to_owned(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|source| CredentialError::Parse { path: path.to_path_buf(), source })?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| CredentialError::Write { path: path.to_path_buf(), source })?;
        }
        write_private(path, json.as_bytes())
            .map_err(|source| CredentialError::Write { path: path.to_path_buf(), source })
    }
}

/// Owner-only on unix; the file holds a long-lived refresh token.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        options.mode(0o600);
        let mut file = options.open(path)?;
        // `mode` only applies on creation, so tighten a file left by an older grant too.
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(contents)
    }
    #[cfg(not(unix))]
    {
        options.open(path)?.write_all(contents)
    }
}
