use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use validator::Validate;

use super::application::Application;
use crate::utils::pincode_rule;

/// Number of view records kept on a job.
pub const VIEW_LOG_CAP: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
    Disputed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Open => "open",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Disputed => "disputed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(JobStatus::Open),
            "in_progress" => Some(JobStatus::InProgress),
            "completed" => Some(JobStatus::Completed),
            "cancelled" => Some(JobStatus::Cancelled),
            "disputed" => Some(JobStatus::Disputed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    #[default]
    Intermediate,
    Expert,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    #[default]
    OneTime,
    Recurring,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::OneTime => "one-time",
            JobType::Recurring => "recurring",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Asap,
    #[default]
    Flexible,
    Scheduled,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Asap => "asap",
            Urgency::Flexible => "flexible",
            Urgency::Scheduled => "scheduled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BudgetType {
    Fixed,
    Negotiable,
    Hourly,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate, JsonSchema)]
pub struct Budget {
    pub budget_type: BudgetType,
    #[validate(range(min = 0.0))]
    pub amount: Option<f64>,
    #[serde(default = "default_currency")]
    #[validate(length(min = 3, max = 3))]
    pub currency: String,
    #[serde(default)]
    pub materials_included: bool,
}

fn default_currency() -> String {
    "INR".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, JsonSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate, JsonSchema)]
pub struct JobLocation {
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(custom = "pincode_rule")]
    pub pincode: Option<String>,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub sender: ObjectId,
    pub message: String,
    pub sent_at: DateTime,
    pub read: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Reply {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub author: ObjectId,
    pub message: String,
    pub created_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub author: ObjectId,
    pub message: String,
    pub created_at: DateTime,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Milestone {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub completed: bool,
    pub completed_at: Option<DateTime>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Progress {
    pub started_at: Option<DateTime>,
    pub completed_at: Option<DateTime>,
    pub marked_done_at: Option<DateTime>,
    pub confirmed_at: Option<DateTime>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub work_images: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobReview {
    pub rating: i32, // 1-5
    pub review: Option<String>,
    pub rated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Completion {
    pub marked_done_by: Option<ObjectId>,
    pub completion_notes: Option<String>,
    #[serde(default)]
    pub before_images: Vec<String>,
    #[serde(default)]
    pub after_images: Vec<String>,
    pub completed_at: Option<DateTime>,
    pub confirmed_by: Option<ObjectId>,
    pub confirmed_at: Option<DateTime>,
    /// Written by the hirer about the fixer.
    pub fixer_rating: Option<JobReview>,
    /// Written by the fixer about the hirer.
    pub hirer_rating: Option<JobReview>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DisputeStatus {
    #[default]
    Pending,
    Investigating,
    Resolved,
    Closed,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Pending => "pending",
            DisputeStatus::Investigating => "investigating",
            DisputeStatus::Resolved => "resolved",
            DisputeStatus::Closed => "closed",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, DisputeStatus::Resolved | DisputeStatus::Closed)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Dispute {
    pub raised: bool,
    pub raised_by: Option<ObjectId>,
    pub reason: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub raised_at: Option<DateTime>,
    pub status: DisputeStatus,
    pub resolution: Option<String>,
    pub resolved_by: Option<ObjectId>,
    pub resolved_at: Option<DateTime>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Cancellation {
    pub cancelled: bool,
    pub cancelled_by: Option<ObjectId>,
    pub reason: Option<String>,
    pub cancelled_at: Option<DateTime>,
    pub refund_amount: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ViewRecord {
    pub user: ObjectId,
    pub viewed_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Views {
    pub count: i64,
    #[serde(default)]
    pub viewed_by: Vec<ViewRecord>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Job {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub version: i64,

    // Content
    pub title: String,
    pub description: String,
    pub skills_required: Vec<String>,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default)]
    pub urgency: Urgency,
    pub scheduled_date: Option<DateTime>,
    pub budget: Budget,
    pub location: JobLocation,
    pub deadline: DateTime,

    // Lifecycle
    pub status: JobStatus,
    pub created_by: ObjectId,
    pub assigned_to: Option<ObjectId>,
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub completion: Completion,
    #[serde(default)]
    pub dispute: Dispute,
    #[serde(default)]
    pub cancellation: Cancellation,

    // Visibility
    #[serde(default)]
    pub featured: bool,
    pub featured_until: Option<DateTime>,
    #[serde(default)]
    pub views: Views,

    pub created_at: DateTime,
    pub updated_at: DateTime,
}

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CreateJobDto {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    #[validate(length(min = 1, max = 20))]
    pub skills_required: Vec<String>,
    pub experience_level: Option<ExperienceLevel>,
    pub job_type: Option<JobType>,
    pub urgency: Option<Urgency>,
    pub scheduled_date: Option<chrono::DateTime<chrono::Utc>>,
    #[validate]
    pub budget: Budget,
    #[validate]
    pub location: JobLocation,
    pub deadline: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub before_images: Vec<String>,
}

/// Fields a hirer may change while the job is still open.
#[derive(Debug, Deserialize, Validate, JsonSchema, Default)]
pub struct UpdateJobDetailsDto {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub skills_required: Option<Vec<String>>,
    pub experience_level: Option<ExperienceLevel>,
    pub job_type: Option<JobType>,
    pub urgency: Option<Urgency>,
    pub scheduled_date: Option<chrono::DateTime<chrono::Utc>>,
    #[validate]
    pub budget: Option<Budget>,
    #[validate]
    pub location: Option<JobLocation>,
    pub deadline: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CancelJobDto {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    #[validate(range(min = 0.0))]
    pub refund_amount: Option<f64>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct FeatureJobDto {
    #[validate(range(min = 1, max = 30))]
    pub days: i64,
}

/// Body of `PUT /jobs/<id>`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum JobAction {
    UpdateDetails(UpdateJobDetailsDto),
    Cancel(CancelJobDto),
    Feature(FeatureJobDto),
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct MarkDoneDto {
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    #[serde(default)]
    pub after_images: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct RatingDto {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 500))]
    pub review: Option<String>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct MilestoneDto {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct WorkImageDto {
    #[validate(length(min = 1, max = 500))]
    pub url: String,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CommentDto {
    #[validate(length(min = 1, max = 500))]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct MessageDto {
    #[validate(length(min = 1, max = 1000))]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct RaiseDisputeDto {
    #[validate(length(min = 1, max = 200))]
    pub reason: String,
    #[validate(length(min = 1, max = 1000))]
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct ResolveDisputeDto {
    pub status: DisputeStatus,
    #[validate(length(min = 1, max = 1000))]
    pub resolution: Option<String>,
}

/// Compact listing shape used by the browse and "my jobs" endpoints.
#[derive(Debug, Serialize, JsonSchema)]
pub struct JobSummary {
    pub id: String,
    pub title: String,
    pub city: String,
    pub skills_required: Vec<String>,
    pub budget_type: BudgetType,
    pub budget_amount: Option<f64>,
    pub currency: String,
    pub urgency: Urgency,
    pub job_type: JobType,
    pub status: JobStatus,
    pub featured: bool,
    pub applications_count: usize,
    pub deadline_ms: i64,
    pub created_at_ms: i64,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        JobSummary {
            id: job.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: job.title.clone(),
            city: job.location.city.clone(),
            skills_required: job.skills_required.clone(),
            budget_type: job.budget.budget_type,
            budget_amount: job.budget.amount,
            currency: job.budget.currency.clone(),
            urgency: job.urgency,
            job_type: job.job_type,
            status: job.status,
            featured: job.featured,
            applications_count: job.active_application_count(),
            deadline_ms: job.deadline.timestamp_millis(),
            created_at_ms: job.created_at.timestamp_millis(),
        }
    }
}
