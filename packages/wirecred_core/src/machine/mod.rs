//! Machine fingerprint resolution
//!
//! Produces a string that is stable across runs on the same host but differs
//! between hosts, without relying on any previously stored file. The
//! fingerprint is key-derivation material: credentials encrypted on one host
//! cannot be decrypted on another.
//!
//! Resolution order:
//! 1. The OS machine identity, protected by HMAC-SHA256 under an application
//!    tag so the raw id never leaves this module.
//! 2. Inside a container the host identity file usually does not exist; the
//!    docker container id from `/proc/self/cgroup` is used instead.
//! 3. A fixed sentinel. Degraded but deterministic; resolution never fails
//!    just because no identity source is present.

use std::io;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// Namespace tag mixed into the protected machine id.
const APP_TAG: &str = "wirecred";

/// Sentinel identity when no host or container id is available.
pub const FALLBACK_ID: &str = "notAMachine";

#[derive(Error, Debug)]
pub enum MachineIdError {
    #[error("cannot read machine identity source: {0}")]
    Io(String),
}

/// Resolve the machine fingerprint.
///
/// Only a not-found condition on the host identity source triggers the
/// container/sentinel fallback chain; any other I/O failure is an error.
pub fn resolve() -> Result<String, MachineIdError> {
    match protected_id(APP_TAG) {
        Ok(id) => Ok(id),
        Err(err) if err.kind() == io::ErrorKind::NotFound => match container_id() {
            Ok(id) => {
                log::debug!("using docker container id as machine identity");
                Ok(id)
            }
            Err(err) => {
                log::debug!("no container id available ({err}), using fallback identity");
                Ok(FALLBACK_ID.to_string())
            }
        },
        Err(err) => Err(MachineIdError::Io(err.to_string())),
    }
}

/// HMAC-SHA256 of the application tag keyed by the raw OS machine id,
/// hex-encoded. The raw id is never exposed to callers.
fn protected_id(app_tag: &str) -> io::Result<String> {
    let raw = read_host_id()?;
    let mut mac = Hmac::<Sha256>::new_from_slice(raw.trim().as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(app_tag.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(target_os = "linux")]
fn read_host_id() -> io::Result<String> {
    match std::fs::read_to_string("/etc/machine-id") {
        Ok(id) => Ok(id),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            std::fs::read_to_string("/var/lib/dbus/machine-id")
        }
        Err(err) => Err(err),
    }
}

#[cfg(target_os = "macos")]
fn read_host_id() -> io::Result<String> {
    let output = std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if line.contains("IOPlatformUUID") {
            if let Some(uuid) = line.split('"').nth(3) {
                return Ok(uuid.to_string());
            }
        }
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        "IOPlatformUUID not found in ioreg output",
    ))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn read_host_id() -> io::Result<String> {
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        "no machine identity source on this platform",
    ))
}

/// Extract the docker container id from the current process's cgroup file.
fn container_id() -> io::Result<String> {
    let cgroup = std::fs::read_to_string("/proc/self/cgroup")?;
    parse_docker_cgroup(&cgroup).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "docker container id not found in cgroup",
        )
    })
}

fn parse_docker_cgroup(cgroup: &str) -> Option<String> {
    for line in cgroup.lines() {
        if let Some((_, id)) = line.split_once("/docker/") {
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}
