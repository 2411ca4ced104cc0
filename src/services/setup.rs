//! Account setup: validate an access token against the API and store the
//! resulting account entry.

use crate::client::{ClientError, ErrorKind};
use crate::services::poller::SnapshotSource;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub const DEFAULT_COOL_TEMP: i32 = 28;
pub const DEFAULT_HEAT_TEMP: i32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    /// MAC address of the account's first device; identifies the account.
    pub mac: String,
    pub access_token: String,
    #[serde(default = "default_cool_temp")]
    pub cool_temperature: i32,
    #[serde(default = "default_heat_temp")]
    pub heat_temperature: i32,
}

fn default_cool_temp() -> i32 {
    DEFAULT_COOL_TEMP
}

fn default_heat_temp() -> i32 {
    DEFAULT_HEAT_TEMP
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Api(#[from] ClientError),
    #[error("account has no devices")]
    NoDevices,
    #[error("first device {0} reports no MAC address")]
    MissingMac(String),
    #[error("account file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("account file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("account file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
}

impl SetupError {
    /// Reason code for the user: `cannot_connect`, `invalid_auth` or `unknown`.
    pub fn reason(&self) -> &'static str {
        match self {
            SetupError::Api(e) => e.kind().reason(),
            _ => ErrorKind::Unknown.reason(),
        }
    }
}

/// Check the token by fetching a full snapshot and build the account entry.
///
/// Uses the first device the API lists as the account's identity.
pub fn validate<S: SnapshotSource>(
    source: &S,
    access_token: &str,
    cool_temperature: i32,
    heat_temperature: i32,
) -> Result<AccountEntry, SetupError> {
    let snapshot = source.fetch_snapshot().inspect_err(|e| {
        if e.kind() == ErrorKind::Unknown || e.kind() == ErrorKind::MalformedData {
            error!("Unexpected error validating access token: {}", e);
        }
    })?;

    let device = snapshot.devices.values().next().ok_or(SetupError::NoDevices)?;
    let mac = device
        .mac_address()
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| SetupError::MissingMac(device.id().0.clone()))?;

    info!("Access token valid; account identified by {}", mac);
    Ok(AccountEntry {
        mac,
        access_token: access_token.to_string(),
        cool_temperature,
        heat_temperature,
    })
}

impl AccountEntry {
    pub fn store(&self, path: &Path) -> Result<(), SetupError> {
        let io_err = |source| SetupError::Io {
            path: path.display().to_string(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| SetupError::Json {
            path: path.display().to_string(),
            source,
        })?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer.flush().map_err(io_err)
    }

    pub fn load(path: &Path) -> Result<Self, SetupError> {
        let file = File::open(path).map_err(|source| SetupError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut de = serde_json::Deserializer::from_reader(BufReader::new(file));
        serde_path_to_error::deserialize(&mut de).map_err(|source| SetupError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
