use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Hirer,
    Fixer,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Hirer => "hirer",
            UserRole::Fixer => "fixer",
            UserRole::Admin => "admin",
        }
    }
}

/// Account record. Written by the identity service, read here for
/// role checks and notification addresses.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub city: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() { "there" } else { &self.name }
    }
}
