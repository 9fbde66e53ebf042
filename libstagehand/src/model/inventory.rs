use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::Id;
use crate::crud::Form;
use crate::error::ApiError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HostGroup {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by_username: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Host {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub ansible_user: Option<String>,
    #[serde(default)]
    pub ansible_port: Option<u16>,
    #[serde(default)]
    pub ssh_key_name: Option<String>,
    #[serde(default)]
    pub groups: Vec<Id>,
    #[serde(default)]
    pub group_details: Option<Vec<HostGroup>>,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub created_by_username: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl Host {
    /// Where the host is reachable, preferring the IP address.
    pub fn address(&self) -> &str {
        self.ip_address
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .or(self.fqdn.as_deref())
            .unwrap_or("-")
    }
}

/// User input for creating or editing a host group.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostGroupForm {
    pub name: String,
    pub description: String,
}

impl HostGroupForm {
    pub fn new<S: Into<String>>(name: S, description: S) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl Form for HostGroupForm {
    type Payload = HostGroupForm;

    fn validate(&self) -> Result<Self::Payload, ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("Host group name is required.".into()));
        }
        Ok(self.clone())
    }
}

impl From<&HostGroup> for HostGroupForm {
    fn from(group: &HostGroup) -> Self {
        Self {
            name: group.name.clone(),
            description: group.description.clone().unwrap_or_default(),
        }
    }
}

/// User input for creating or editing a host. Text fields are kept as typed;
/// `variables` is free-text JSON that is only parsed on submission.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostForm {
    pub name: String,
    pub ip_address: String,
    pub fqdn: String,
    pub ansible_user: String,
    pub ansible_port: Option<u16>,
    pub ssh_key_name: String,
    pub groups: Vec<Id>,
    pub variables: String,
}

/// The body actually sent for a host create/update.
#[derive(Getters, Clone, Debug, Serialize, PartialEq)]
pub struct HostPayload {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fqdn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ansible_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ansible_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssh_key_name: Option<String>,
    groups: Vec<Id>,
    variables: Map<String, Value>,
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Parse host variables. Blank input means an empty object; anything that
/// isn't a JSON object is rejected.
const INVALID_VARIABLES: &str = "Host variables are not valid JSON. \
    Please provide a valid JSON object or an empty object {}.";

pub fn parse_variables(text: &str) -> Result<Map<String, Value>, ApiError> {
    if text.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ApiError::Validation(INVALID_VARIABLES.into())),
    }
}

impl Form for HostForm {
    type Payload = HostPayload;

    fn validate(&self) -> Result<Self::Payload, ApiError> {
        let variables = parse_variables(&self.variables)?;
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("Host name is required.".into()));
        }
        let ip_address = non_blank(&self.ip_address);
        let fqdn = non_blank(&self.fqdn);
        if ip_address.is_none() && fqdn.is_none() {
            return Err(ApiError::Validation(
                "Either IP Address or FQDN must be provided for the host.".into(),
            ));
        }
        Ok(HostPayload {
            name: self.name.trim().to_string(),
            ip_address,
            fqdn,
            ansible_user: non_blank(&self.ansible_user),
            ansible_port: self.ansible_port,
            ssh_key_name: non_blank(&self.ssh_key_name),
            groups: self.groups.clone(),
            variables,
        })
    }
}

impl From<&Host> for HostForm {
    fn from(host: &Host) -> Self {
        let variables = if host.variables.is_empty() {
            String::new()
        } else {
            serde_json::to_string_pretty(&host.variables).unwrap_or_default()
        };
        Self {
            name: host.name.clone(),
            ip_address: host.ip_address.clone().unwrap_or_default(),
            fqdn: host.fqdn.clone().unwrap_or_default(),
            ansible_user: host.ansible_user.clone().unwrap_or_default(),
            ansible_port: host.ansible_port,
            ssh_key_name: host.ssh_key_name.clone().unwrap_or_default(),
            groups: host.groups.clone(),
            variables,
        }
    }
}
