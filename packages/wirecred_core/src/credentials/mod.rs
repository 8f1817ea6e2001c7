//! Credential store
//!
//! One credential file per instance at `<conf-dir>/<instance>.json`. The
//! branch is decided once per run: no file means register a new client with
//! the IAM server and persist the answer encrypted; an existing file means
//! decrypt it and rebuild the response without touching the network.
//!
//! The file is never rotated or deleted here. Whether its bytes are raw JSON
//! or an encrypted blob is determined by the caller's `protect` setting, not
//! by any on-disk marker, so a store must be opened with the same setting it
//! was created with.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::crypto::{codec, CryptoError, Secret};
use crate::input::Prompt;
use crate::registration::{self, ClientConfig, RegistrationError, RegistrationResponse};

/// Default offered when the IAM endpoint has to be asked for interactively.
pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.example.org";

/// Substituted for the password when `REFRESH_TOKEN` is set: automation mode
/// trades confidentiality for non-interactive operation.
const PLACEHOLDER_PASSWORD: &[u8] = b"nopassword";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("wrong password or corrupted credential store")]
    Authentication,

    #[error("crypto failure: {0}")]
    Crypto(CryptoError),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("stored credentials are not valid JSON: {0}")]
    Malformed(String),

    #[error("input error: {0}")]
    Input(String),
}

impl From<CryptoError> for CredentialError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Authentication => CredentialError::Authentication,
            other => CredentialError::Crypto(other),
        }
    }
}

/// Orchestrates registration, encryption and persistence for one instance.
pub struct CredentialStore {
    /// Directory holding `<instance>.json`.
    pub conf_dir: PathBuf,
    /// Request-shaping data passed to the registration call.
    pub client: ClientConfig,
    /// Registration endpoint; when absent the input collaborator is asked.
    pub iam_endpoint: Option<String>,
    /// Password-protect (and persist) the registered credentials.
    pub protect: bool,
    /// HTTP client used for the registration call. TLS policy is the
    /// caller's business.
    pub http: reqwest::blocking::Client,
}

impl CredentialStore {
    /// Provision credentials for `instance`: register anew or reuse the
    /// cached file. Returns the resolved IAM endpoint and the response.
    pub fn provision(
        &self,
        instance: &str,
        prompt: &mut dyn Prompt,
    ) -> Result<(String, RegistrationResponse), CredentialError> {
        let path = self.conf_dir.join(format!("{instance}.json"));
        log::debug!("credential file: {}", path.display());

        let (endpoint, response) = match fs::read(&path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.register_new(&path, prompt)?
            }
            Ok(stored) => self.reuse_stored(&stored, prompt)?,
            // Ambiguous state (permissions, I/O, ...): abort rather than
            // guess whether the file exists.
            Err(err) => {
                return Err(CredentialError::Filesystem(format!(
                    "cannot open {}: {err}",
                    path.display()
                )))
            }
        };

        if endpoint.is_empty() {
            return Err(CredentialError::Config("no IAM endpoint selected".into()));
        }
        Ok((endpoint, response))
    }

    fn register_new(
        &self,
        path: &Path,
        prompt: &mut dyn Prompt,
    ) -> Result<(String, RegistrationResponse), CredentialError> {
        let endpoint = match self.iam_endpoint.as_deref() {
            Some(configured) if !configured.is_empty() => {
                log::debug!("IAM endpoint from configuration: {configured}");
                configured.to_string()
            }
            _ => prompt
                .ask_string("Insert the IAM endpoint", DEFAULT_IAM_ENDPOINT)
                .map_err(|e| CredentialError::Input(e.to_string()))?,
        };

        let response = registration::register(&endpoint, &self.client, &self.http)?;

        if self.protect {
            let password = self.obtain_password(
                prompt,
                "Insert a password for the secret's encryption",
                true,
            )?;
            let plaintext = serde_json::to_vec(&response)
                .map_err(|e| CredentialError::Malformed(e.to_string()))?;
            let blob = codec::encrypt(&plaintext, &password)?;
            write_restricted(path, &blob)?;
            log::debug!("credentials written to {}", path.display());
        }

        Ok((endpoint, response))
    }

    fn reuse_stored(
        &self,
        stored: &[u8],
        prompt: &mut dyn Prompt,
    ) -> Result<(String, RegistrationResponse), CredentialError> {
        let response: RegistrationResponse = if self.protect {
            let password = self.obtain_password(
                prompt,
                "Insert the password for the secret's decryption",
                false,
            )?;
            let plaintext = codec::decrypt(stored, &password)?;
            serde_json::from_slice(&plaintext)
                .map_err(|e| CredentialError::Malformed(e.to_string()))?
        } else {
            serde_json::from_slice(stored)
                .map_err(|e| CredentialError::Malformed(e.to_string()))?
        };

        // A file written by an older tool may hold the full
        // registration_client_uri; keep only the part before "/register".
        let endpoint = response
            .endpoint
            .split("/register")
            .next()
            .unwrap_or_default()
            .to_string();
        log::debug!("recovered IAM endpoint: {endpoint}");

        Ok((endpoint, response))
    }

    /// Collect a password, or substitute the fixed placeholder when
    /// `REFRESH_TOKEN` is present in the environment.
    // TODO: confirm the intended behavior when REFRESH_TOKEN is set to the
    // empty string; it is currently treated as unset.
    fn obtain_password(
        &self,
        prompt: &mut dyn Prompt,
        question: &str,
        confirm: bool,
    ) -> Result<Secret, CredentialError> {
        match env::var("REFRESH_TOKEN") {
            Ok(token) if !token.is_empty() => {
                log::debug!("REFRESH_TOKEN set, using placeholder password");
                Ok(Secret::new(PLACEHOLDER_PASSWORD.to_vec()))
            }
            _ => prompt
                .ask_password(question, confirm)
                .map_err(|e| CredentialError::Input(e.to_string())),
        }
    }
}

/// Write the credential file readable and writable by the owner only.
fn write_restricted(path: &Path, bytes: &[u8]) -> Result<(), CredentialError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| {
        CredentialError::Filesystem(format!("cannot write {}: {e}", path.display()))
    })?;
    file.write_all(bytes).map_err(|e| {
        CredentialError::Filesystem(format!("cannot write {}: {e}", path.display()))
    })
}
