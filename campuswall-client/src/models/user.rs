use serde::{Deserialize, Serialize};

/// The profile record cached next to the bearer token.
///
/// Only `uid`, `name` and `avatar` are guaranteed by the backend; the rest
/// are user-editable and may be absent.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserProfile {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hometown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default = "default_enabled")]
    pub enable: bool,
}

fn default_enabled() -> bool {
    true
}
