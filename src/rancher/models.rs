// ABOUTME: Data types exchanged with the Rancher control plane
// Container listing records, the execute request body and the execution grant

use super::error::ResolveError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Basic-auth credentials and the control-plane endpoint they apply to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        endpoint: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            user: user.into(),
            password: password.into(),
        }
    }
}

/// Columns and rows of the controlling terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalGeometry {
    pub cols: u16,
    pub rows: u16,
}

// ============================================
// Container listing
// ============================================

#[derive(Debug, Deserialize)]
pub struct ContainerList {
    pub data: Vec<ContainerRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    id: Option<String>,
    name: Option<String>,
    account_id: Option<String>,
    primary_ip_address: Option<String>,
    data: Option<PlacementData>,
}

#[derive(Debug, Deserialize)]
struct PlacementData {
    fields: Option<PlacementFields>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlacementFields {
    primary_ip_address: Option<String>,
    docker_host_ip: Option<String>,
}

/// A running container that matched the name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerCandidate {
    pub id: String,
    pub name: String,
    pub owner_project_id: String,
    pub primary_ip_address: String,
    pub host_ip_address: Option<String>,
}

impl TryFrom<ContainerRecord> for ContainerCandidate {
    type Error = ResolveError;

    fn try_from(record: ContainerRecord) -> Result<Self, Self::Error> {
        let id = record
            .id
            .ok_or_else(|| ResolveError::Protocol("container record without id".to_string()))?;
        let name = record.name.ok_or_else(|| {
            ResolveError::Protocol(format!("container record {id} without name"))
        })?;

        // Extended placement data wins over the top-level address
        let fields = record.data.and_then(|data| data.fields);
        let (primary_ip_address, host_ip_address) = match fields {
            Some(fields) => (
                fields
                    .primary_ip_address
                    .or(record.primary_ip_address)
                    .unwrap_or_default(),
                Some(fields.docker_host_ip.unwrap_or_default()),
            ),
            None => (record.primary_ip_address.unwrap_or_default(), None),
        };

        Ok(Self {
            id,
            name,
            owner_project_id: record.account_id.unwrap_or_default(),
            primary_ip_address,
            host_ip_address,
        })
    }
}

impl ContainerCandidate {
    /// Line shown for the 1-indexed entry `index` of an ambiguous listing.
    pub fn listing_line(&self, index: usize) -> String {
        let mut line = format!(
            "[{}] {}, Container ID {} in project {}, IP Address {}",
            index, self.name, self.id, self.owner_project_id, self.primary_ip_address
        );
        self.push_host(&mut line);
        line
    }

    /// Confirmation line printed once a container has been picked.
    pub fn target_line(&self) -> String {
        let mut line = format!(
            "Target Container: {}, ID {} in project {}, Addr {}",
            self.name, self.id, self.owner_project_id, self.primary_ip_address
        );
        self.push_host(&mut line);
        line
    }

    fn push_host(&self, line: &mut String) {
        if let Some(host) = &self.host_ip_address {
            line.push_str(" on Host ");
            line.push_str(host);
        }
    }
}

/// Short `name (id)` form used in log lines.
impl fmt::Display for ContainerCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

// ============================================
// Execute action
// ============================================

const SHELL_LAUNCHER: &str = "[ -x /bin/bash ] && ([ -x /usr/bin/script ] && /usr/bin/script -q -c \"/bin/bash\" /dev/null || exec /bin/bash) || exec /bin/sh";

/// Body of `POST /containers/{id}/?action=execute`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecRequest {
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub command: Vec<String>,
    pub tty: bool,
}

impl ExecRequest {
    /// Interactive shell request sized to `geometry` when it is known.
    pub fn interactive_shell(geometry: Option<TerminalGeometry>) -> Self {
        let mut script = String::from("TERM=xterm-256color; export TERM; ");
        if let Some(TerminalGeometry { cols, rows }) = geometry {
            script.push_str(&format!("stty cols {cols} rows {rows}; "));
        }
        script.push_str(SHELL_LAUNCHER);

        Self {
            attach_stdin: true,
            attach_stdout: true,
            command: vec!["/bin/sh".to_string(), "-c".to_string(), script],
            tty: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecResponse {
    url: Option<serde_json::Value>,
    token: Option<serde_json::Value>,
}

/// Single-use socket URL and token returned by the execute action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionGrant {
    pub socket_url: String,
    pub token: String,
}

impl TryFrom<ExecResponse> for ExecutionGrant {
    type Error = ResolveError;

    fn try_from(response: ExecResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            socket_url: required_string(response.url, "url")?,
            token: required_string(response.token, "token")?,
        })
    }
}

fn required_string(value: Option<serde_json::Value>, field: &str) -> Result<String, ResolveError> {
    match value {
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(other) => Err(ResolveError::Protocol(format!(
            "execute response field `{field}` is not a string: {other}"
        ))),
        None => Err(ResolveError::Protocol(format!(
            "execute response is missing `{field}`"
        ))),
    }
}

impl ExecutionGrant {
    /// Consumes the grant into the URL the framed transport dials.
    pub fn into_dial_url(self) -> String {
        format!("{}?token={}", self.socket_url, self.token)
    }
}
