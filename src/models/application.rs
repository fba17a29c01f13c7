use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Hours,
    Days,
    Weeks,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate, JsonSchema)]
pub struct TimeEstimate {
    #[validate(range(min = 1))]
    pub value: i32,
    pub unit: TimeUnit,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate, JsonSchema)]
pub struct MaterialItem {
    #[validate(length(min = 1, max = 100))]
    pub item: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(range(min = 0.0))]
    pub estimated_cost: f64,
}

/// A fixer's proposal on a job. Lives inside the job document.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Application {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub fixer: ObjectId,
    pub proposed_amount: f64,
    pub time_estimate: TimeEstimate,
    #[serde(default)]
    pub materials_list: Vec<MaterialItem>,
    pub cover_letter: Option<String>,
    pub status: ApplicationStatus,
    pub applied_at: DateTime,
}

impl Application {
    pub fn is_active(&self) -> bool {
        self.status != ApplicationStatus::Withdrawn
    }
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct ApplyDto {
    #[validate(range(min = 0.0))]
    pub proposed_amount: f64,
    #[validate]
    pub time_estimate: TimeEstimate,
    #[serde(default)]
    #[validate]
    pub materials_list: Vec<MaterialItem>,
    #[validate(length(max = 1000))]
    pub cover_letter: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ApplicationResponse {
    pub id: String,
    pub fixer_id: String,
    pub proposed_amount: f64,
    pub time_estimate: TimeEstimate,
    pub materials_list: Vec<MaterialItem>,
    pub cover_letter: Option<String>,
    pub status: ApplicationStatus,
    pub applied_at_ms: i64,
}

impl From<&Application> for ApplicationResponse {
    fn from(application: &Application) -> Self {
        ApplicationResponse {
            id: application.id.to_hex(),
            fixer_id: application.fixer.to_hex(),
            proposed_amount: application.proposed_amount,
            time_estimate: application.time_estimate.clone(),
            materials_list: application.materials_list.clone(),
            cover_letter: application.cover_letter.clone(),
            status: application.status,
            applied_at_ms: application.applied_at.timestamp_millis(),
        }
    }
}
