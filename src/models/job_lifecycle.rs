use chrono::{Local, NaiveDate, TimeZone};
use mongodb::bson::{oid::ObjectId, DateTime};
use thiserror::Error;

use super::application::{Application, ApplicationStatus, ApplyDto};
use super::job::*;

/// Why a lifecycle operation was refused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JobError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),
}

impl JobError {
    fn wrong_status(action: &str, status: JobStatus) -> Self {
        JobError::InvalidState(format!("Cannot {} while job is {}", action, status))
    }
}

pub type JobResult<T> = Result<T, JobError>;

pub fn to_bson_datetime(value: chrono::DateTime<chrono::Utc>) -> DateTime {
    DateTime::from_millis(value.timestamp_millis())
}

/// Calendar day of `at` in the server's local time zone.
fn local_day(at: DateTime) -> Option<NaiveDate> {
    Local
        .timestamp_millis_opt(at.timestamp_millis())
        .single()
        .map(|d| d.date_naive())
}

/// Lowercases and trims skills, dropping blanks and repeats.
pub fn normalize_skills(skills: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(skills.len());
    for skill in skills {
        let skill = skill.trim().to_lowercase();
        if !skill.is_empty() && !normalized.contains(&skill) {
            normalized.push(skill);
        }
    }
    normalized
}

fn require_future(field: &str, value: DateTime, now: DateTime) -> JobResult<()> {
    if value <= now {
        return Err(JobError::Validation(format!("{} must be in the future", field)));
    }
    Ok(())
}

fn check_budget(budget: &Budget) -> JobResult<()> {
    match budget.budget_type {
        BudgetType::Fixed | BudgetType::Hourly if budget.amount.is_none() => Err(
            JobError::Validation("Budget amount is required for fixed and hourly jobs".to_string()),
        ),
        _ => Ok(()),
    }
}

fn check_rating(rating: i32, review: Option<&String>) -> JobResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(JobError::Validation("Rating must be between 1 and 5".to_string()));
    }
    if review.map(|r| r.chars().count() > 500).unwrap_or(false) {
        return Err(JobError::Validation("Review cannot exceed 500 characters".to_string()));
    }
    Ok(())
}

fn check_text(field: &str, value: &str, max: usize) -> JobResult<()> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(JobError::Validation(format!("{} is required", field)));
    }
    if len > max {
        return Err(JobError::Validation(format!("{} cannot exceed {} characters", field, max)));
    }
    Ok(())
}

impl Job {
    /// Builds a freshly posted job. Dates are checked against `now` here and
    /// again only when they are changed later.
    pub fn new(created_by: ObjectId, dto: CreateJobDto, now: DateTime) -> JobResult<Self> {
        let deadline = to_bson_datetime(dto.deadline);
        require_future("Deadline", deadline, now)?;

        let scheduled_date = dto.scheduled_date.map(to_bson_datetime);
        if let Some(date) = scheduled_date {
            require_future("Scheduled date", date, now)?;
        }
        let urgency = dto.urgency.unwrap_or_default();
        if urgency == Urgency::Scheduled && scheduled_date.is_none() {
            return Err(JobError::Validation(
                "Scheduled jobs need a scheduled date".to_string(),
            ));
        }

        check_budget(&dto.budget)?;
        check_text("Title", &dto.title, 100)?;
        check_text("Description", &dto.description, 2000)?;

        let skills_required = normalize_skills(&dto.skills_required);
        if skills_required.is_empty() {
            return Err(JobError::Validation("At least one skill is required".to_string()));
        }

        Ok(Job {
            id: None,
            version: 0,
            title: dto.title.trim().to_string(),
            description: dto.description.trim().to_string(),
            skills_required,
            experience_level: dto.experience_level.unwrap_or_default(),
            job_type: dto.job_type.unwrap_or_default(),
            urgency,
            scheduled_date,
            budget: dto.budget,
            location: dto.location,
            deadline,
            status: JobStatus::Open,
            created_by,
            assigned_to: None,
            applications: Vec::new(),
            messages: Vec::new(),
            comments: Vec::new(),
            progress: Progress::default(),
            completion: Completion {
                before_images: dto.before_images,
                ..Completion::default()
            },
            dispute: Dispute::default(),
            cancellation: Cancellation::default(),
            featured: false,
            featured_until: None,
            views: Views::default(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_creator(&self, user: &ObjectId) -> bool {
        &self.created_by == user
    }

    pub fn is_assignee(&self, user: &ObjectId) -> bool {
        self.assigned_to.as_ref() == Some(user)
    }

    /// The creator or the current assignee.
    pub fn is_party(&self, user: &ObjectId) -> bool {
        self.is_creator(user) || self.is_assignee(user)
    }

    pub fn active_application_count(&self) -> usize {
        self.applications.iter().filter(|a| a.is_active()).count()
    }

    fn ensure_creator(&self, user: &ObjectId, message: &'static str) -> JobResult<()> {
        if !self.is_creator(user) {
            return Err(JobError::Unauthorized(message));
        }
        Ok(())
    }

    fn ensure_assignee(&self, user: &ObjectId, message: &'static str) -> JobResult<()> {
        if !self.is_assignee(user) {
            return Err(JobError::Unauthorized(message));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: JobStatus, action: &str) -> JobResult<()> {
        if self.status != expected {
            return Err(JobError::wrong_status(action, self.status));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Applications
    // ------------------------------------------------------------------

    pub fn check_can_apply(&self, user: &ObjectId, now: DateTime) -> JobResult<()> {
        self.ensure_status(JobStatus::Open, "apply")?;
        if self.is_creator(user) {
            return Err(JobError::Unauthorized("You cannot apply to your own job"));
        }
        if self.deadline <= now {
            return Err(JobError::InvalidState(
                "The application deadline has passed".to_string(),
            ));
        }
        let already_applied = self
            .applications
            .iter()
            .any(|a| &a.fixer == user && a.is_active());
        if already_applied {
            return Err(JobError::InvalidState(
                "You have already applied to this job".to_string(),
            ));
        }
        Ok(())
    }

    pub fn can_apply(&self, user: &ObjectId, now: DateTime) -> bool {
        self.check_can_apply(user, now).is_ok()
    }

    /// The fixer's most recent application, withdrawn ones included.
    pub fn application_by_fixer(&self, fixer: &ObjectId) -> Option<&Application> {
        self.applications.iter().rev().find(|a| &a.fixer == fixer)
    }

    pub fn application(&self, application_id: &ObjectId) -> Option<&Application> {
        self.applications.iter().find(|a| &a.id == application_id)
    }

    pub fn apply(&mut self, fixer: ObjectId, dto: ApplyDto, now: DateTime) -> JobResult<ObjectId> {
        self.check_can_apply(&fixer, now)?;
        if dto.proposed_amount < 0.0 {
            return Err(JobError::Validation("Proposed amount cannot be negative".to_string()));
        }
        if dto.time_estimate.value < 1 {
            return Err(JobError::Validation("Time estimate must be positive".to_string()));
        }
        if let Some(letter) = &dto.cover_letter {
            if letter.chars().count() > 1000 {
                return Err(JobError::Validation(
                    "Cover letter cannot exceed 1000 characters".to_string(),
                ));
            }
        }

        let id = ObjectId::new();
        self.applications.push(Application {
            id,
            fixer,
            proposed_amount: dto.proposed_amount,
            time_estimate: dto.time_estimate,
            materials_list: dto.materials_list,
            cover_letter: dto.cover_letter,
            status: ApplicationStatus::Pending,
            applied_at: now,
        });
        Ok(id)
    }

    pub fn withdraw_application(&mut self, fixer: &ObjectId) -> JobResult<ObjectId> {
        self.ensure_status(JobStatus::Open, "withdraw an application")?;
        let application = self
            .applications
            .iter_mut()
            .rev()
            .find(|a| &a.fixer == fixer && a.status == ApplicationStatus::Pending)
            .ok_or(JobError::NotFound("Pending application"))?;
        application.status = ApplicationStatus::Withdrawn;
        Ok(application.id)
    }

    pub fn reject_application(&mut self, hirer: &ObjectId, application_id: &ObjectId) -> JobResult<()> {
        self.ensure_creator(hirer, "Only the job creator can reject applications")?;
        self.ensure_status(JobStatus::Open, "reject an application")?;
        let application = self
            .applications
            .iter_mut()
            .find(|a| &a.id == application_id)
            .ok_or(JobError::NotFound("Application"))?;
        if application.status != ApplicationStatus::Pending {
            return Err(JobError::InvalidState(
                "Only pending applications can be rejected".to_string(),
            ));
        }
        application.status = ApplicationStatus::Rejected;
        Ok(())
    }

    /// Awards the job to one application and rejects every other one.
    /// Returns the hired fixer.
    pub fn accept_application(
        &mut self,
        hirer: &ObjectId,
        application_id: &ObjectId,
        now: DateTime,
    ) -> JobResult<ObjectId> {
        self.ensure_creator(hirer, "Only the job creator can accept applications")?;
        self.ensure_status(JobStatus::Open, "accept an application")?;
        let chosen = self
            .application(application_id)
            .ok_or(JobError::NotFound("Application"))?;
        if chosen.status != ApplicationStatus::Pending {
            return Err(JobError::InvalidState(
                "Only pending applications can be accepted".to_string(),
            ));
        }
        let fixer = chosen.fixer;

        for application in self.applications.iter_mut() {
            application.status = if &application.id == application_id {
                ApplicationStatus::Accepted
            } else {
                ApplicationStatus::Rejected
            };
        }
        self.assigned_to = Some(fixer);
        self.status = JobStatus::InProgress;
        self.progress.started_at = Some(now);
        Ok(fixer)
    }

    // ------------------------------------------------------------------
    // Progress and completion
    // ------------------------------------------------------------------

    pub fn mark_done(
        &mut self,
        fixer: &ObjectId,
        notes: Option<String>,
        after_images: Vec<String>,
        now: DateTime,
    ) -> JobResult<()> {
        self.ensure_assignee(fixer, "Only the assigned fixer can mark this job done")?;
        self.ensure_status(JobStatus::InProgress, "mark the job done")?;
        if notes.as_ref().map(|n| n.chars().count() > 500).unwrap_or(false) {
            return Err(JobError::Validation(
                "Completion notes cannot exceed 500 characters".to_string(),
            ));
        }

        self.status = JobStatus::Completed;
        // Both timestamps are kept; older clients read either one.
        self.progress.completed_at = Some(now);
        self.progress.marked_done_at = Some(now);
        self.completion.completed_at = Some(now);
        self.completion.marked_done_by = Some(*fixer);
        self.completion.completion_notes = notes;
        self.completion.after_images = after_images;
        Ok(())
    }

    pub fn confirm_completion(
        &mut self,
        hirer: &ObjectId,
        rating: i32,
        review: Option<String>,
        now: DateTime,
    ) -> JobResult<()> {
        self.ensure_creator(hirer, "Only the job creator can confirm completion")?;
        self.ensure_status(JobStatus::Completed, "confirm completion")?;
        if self.completion.confirmed_at.is_some() {
            return Err(JobError::InvalidState("Completion is already confirmed".to_string()));
        }
        check_rating(rating, review.as_ref())?;

        self.progress.confirmed_at = Some(now);
        self.completion.confirmed_at = Some(now);
        self.completion.confirmed_by = Some(*hirer);
        self.completion.fixer_rating = Some(JobReview {
            rating,
            review,
            rated_at: now,
        });
        Ok(())
    }

    /// The fixer's review of the hirer.
    pub fn rate_hirer(
        &mut self,
        fixer: &ObjectId,
        rating: i32,
        review: Option<String>,
        now: DateTime,
    ) -> JobResult<()> {
        self.ensure_assignee(fixer, "Only the assigned fixer can rate the hirer")?;
        self.ensure_status(JobStatus::Completed, "rate the hirer")?;
        if self.completion.hirer_rating.is_some() {
            return Err(JobError::InvalidState("The hirer has already been rated".to_string()));
        }
        check_rating(rating, review.as_ref())?;

        self.completion.hirer_rating = Some(JobReview {
            rating,
            review,
            rated_at: now,
        });
        Ok(())
    }

    pub fn add_milestone(&mut self, fixer: &ObjectId, title: String) -> JobResult<ObjectId> {
        self.ensure_assignee(fixer, "Only the assigned fixer can add milestones")?;
        self.ensure_status(JobStatus::InProgress, "add a milestone")?;
        check_text("Milestone title", &title, 200)?;

        let id = ObjectId::new();
        self.progress.milestones.push(Milestone {
            id,
            title: title.trim().to_string(),
            completed: false,
            completed_at: None,
        });
        Ok(id)
    }

    pub fn complete_milestone(
        &mut self,
        fixer: &ObjectId,
        milestone_id: &ObjectId,
        now: DateTime,
    ) -> JobResult<()> {
        self.ensure_assignee(fixer, "Only the assigned fixer can update milestones")?;
        self.ensure_status(JobStatus::InProgress, "update a milestone")?;
        let milestone = self
            .progress
            .milestones
            .iter_mut()
            .find(|m| &m.id == milestone_id)
            .ok_or(JobError::NotFound("Milestone"))?;
        if milestone.completed {
            return Err(JobError::InvalidState("Milestone is already completed".to_string()));
        }
        milestone.completed = true;
        milestone.completed_at = Some(now);
        Ok(())
    }

    pub fn add_work_image(&mut self, fixer: &ObjectId, url: String) -> JobResult<()> {
        self.ensure_assignee(fixer, "Only the assigned fixer can upload work images")?;
        self.ensure_status(JobStatus::InProgress, "add work images")?;
        check_text("Image URL", &url, 500)?;
        self.progress.work_images.push(url);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Q&A and messaging
    // ------------------------------------------------------------------

    pub fn add_comment(&mut self, author: ObjectId, message: String, now: DateTime) -> JobResult<ObjectId> {
        check_text("Comment", &message, 500)?;
        let id = ObjectId::new();
        self.comments.push(Comment {
            id,
            author,
            message: message.trim().to_string(),
            created_at: now,
            replies: Vec::new(),
        });
        Ok(id)
    }

    pub fn add_reply(
        &mut self,
        comment_id: &ObjectId,
        author: ObjectId,
        message: String,
        now: DateTime,
    ) -> JobResult<ObjectId> {
        check_text("Reply", &message, 500)?;
        let comment = self
            .comments
            .iter_mut()
            .find(|c| &c.id == comment_id)
            .ok_or(JobError::NotFound("Comment"))?;
        let id = ObjectId::new();
        comment.replies.push(Reply {
            id,
            author,
            message: message.trim().to_string(),
            created_at: now,
        });
        Ok(id)
    }

    pub fn add_message(&mut self, sender: ObjectId, message: String, now: DateTime) -> JobResult<ObjectId> {
        if !self.is_party(&sender) {
            return Err(JobError::Unauthorized("Only the hirer and the assigned fixer can message"));
        }
        check_text("Message", &message, 1000)?;
        let id = ObjectId::new();
        self.messages.push(Message {
            id,
            sender,
            message: message.trim().to_string(),
            sent_at: now,
            read: false,
        });
        Ok(id)
    }

    /// Marks every message the reader did not send as read.
    pub fn mark_messages_read(&mut self, reader: &ObjectId) -> JobResult<usize> {
        if !self.is_party(reader) {
            return Err(JobError::Unauthorized("Only the hirer and the assigned fixer can read messages"));
        }
        let mut marked = 0;
        for message in self.messages.iter_mut() {
            if &message.sender != reader && !message.read {
                message.read = true;
                marked += 1;
            }
        }
        Ok(marked)
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Counts at most one view per user per local calendar day. The
    /// creator's own views are ignored. Returns whether the view counted.
    pub fn add_view(&mut self, user: &ObjectId, now: DateTime) -> bool {
        if self.is_creator(user) {
            return false;
        }
        let today = local_day(now);
        let seen_today = self
            .views
            .viewed_by
            .iter()
            .any(|v| &v.user == user && local_day(v.viewed_at) == today);
        if seen_today {
            return false;
        }

        self.views.count += 1;
        self.views.viewed_by.push(ViewRecord {
            user: *user,
            viewed_at: now,
        });
        let overflow = self.views.viewed_by.len().saturating_sub(VIEW_LOG_CAP);
        if overflow > 0 {
            self.views.viewed_by.drain(..overflow);
        }
        true
    }

    // ------------------------------------------------------------------
    // Disputes and cancellation
    // ------------------------------------------------------------------

    pub fn raise_dispute(&mut self, user: &ObjectId, dto: RaiseDisputeDto, now: DateTime) -> JobResult<()> {
        if !self.is_party(user) {
            return Err(JobError::Unauthorized("Only the hirer or the assigned fixer can raise a dispute"));
        }
        if self.status == JobStatus::Cancelled {
            return Err(JobError::wrong_status("raise a dispute", self.status));
        }
        if self.dispute.raised {
            return Err(JobError::InvalidState("A dispute is already open for this job".to_string()));
        }
        check_text("Dispute reason", &dto.reason, 200)?;
        check_text("Dispute description", &dto.description, 1000)?;

        self.dispute = Dispute {
            raised: true,
            raised_by: Some(*user),
            reason: Some(dto.reason.trim().to_string()),
            description: Some(dto.description.trim().to_string()),
            evidence: dto.evidence,
            raised_at: Some(now),
            status: DisputeStatus::Pending,
            resolution: None,
            resolved_by: None,
            resolved_at: None,
        };
        self.status = JobStatus::Disputed;
        Ok(())
    }

    /// Moves an open dispute forward. The job itself stays disputed.
    pub fn resolve_dispute(
        &mut self,
        admin: &ObjectId,
        status: DisputeStatus,
        resolution: Option<String>,
        now: DateTime,
    ) -> JobResult<()> {
        if !self.dispute.raised {
            return Err(JobError::InvalidState("No dispute has been raised for this job".to_string()));
        }
        if self.dispute.status.is_final() {
            return Err(JobError::InvalidState("This dispute is already settled".to_string()));
        }
        if status == DisputeStatus::Pending || status == self.dispute.status {
            return Err(JobError::InvalidState(format!(
                "Cannot move dispute from {} to {}",
                self.dispute.status.as_str(),
                status.as_str()
            )));
        }
        if status == DisputeStatus::Resolved && resolution.is_none() {
            return Err(JobError::Validation("A resolution is required to resolve a dispute".to_string()));
        }

        self.dispute.status = status;
        if resolution.is_some() {
            self.dispute.resolution = resolution;
        }
        if status.is_final() {
            self.dispute.resolved_by = Some(*admin);
            self.dispute.resolved_at = Some(now);
        }
        Ok(())
    }

    pub fn cancel(
        &mut self,
        user: &ObjectId,
        reason: String,
        refund_amount: Option<f64>,
        now: DateTime,
    ) -> JobResult<()> {
        if !self.is_party(user) {
            return Err(JobError::Unauthorized("Only the hirer or the assigned fixer can cancel this job"));
        }
        if !matches!(self.status, JobStatus::Open | JobStatus::InProgress) {
            return Err(JobError::wrong_status("cancel", self.status));
        }
        check_text("Cancellation reason", &reason, 500)?;
        if refund_amount.map(|a| a < 0.0).unwrap_or(false) {
            return Err(JobError::Validation("Refund amount cannot be negative".to_string()));
        }

        self.cancellation = Cancellation {
            cancelled: true,
            cancelled_by: Some(*user),
            reason: Some(reason.trim().to_string()),
            cancelled_at: Some(now),
            refund_amount,
        };
        self.status = JobStatus::Cancelled;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Editing and promotion
    // ------------------------------------------------------------------

    pub fn update_details(&mut self, user: &ObjectId, dto: UpdateJobDetailsDto, now: DateTime) -> JobResult<()> {
        self.ensure_creator(user, "Only the job creator can edit this job")?;
        self.ensure_status(JobStatus::Open, "edit the job")?;

        // Validate everything before touching the job.
        let deadline = dto.deadline.map(to_bson_datetime);
        if let Some(deadline) = deadline {
            require_future("Deadline", deadline, now)?;
        }
        let scheduled_date = dto.scheduled_date.map(to_bson_datetime);
        if let Some(date) = scheduled_date {
            require_future("Scheduled date", date, now)?;
        }
        if let Some(budget) = &dto.budget {
            check_budget(budget)?;
        }
        if let Some(title) = &dto.title {
            check_text("Title", title, 100)?;
        }
        if let Some(description) = &dto.description {
            check_text("Description", description, 2000)?;
        }
        let skills = dto.skills_required.as_deref().map(normalize_skills);
        if skills.as_ref().map(|s| s.is_empty()).unwrap_or(false) {
            return Err(JobError::Validation("At least one skill is required".to_string()));
        }
        let urgency = dto.urgency.unwrap_or(self.urgency);
        if urgency == Urgency::Scheduled && scheduled_date.or(self.scheduled_date).is_none() {
            return Err(JobError::Validation("Scheduled jobs need a scheduled date".to_string()));
        }

        if let Some(title) = dto.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = dto.description {
            self.description = description.trim().to_string();
        }
        if let Some(skills) = skills {
            self.skills_required = skills;
        }
        if let Some(level) = dto.experience_level {
            self.experience_level = level;
        }
        if let Some(job_type) = dto.job_type {
            self.job_type = job_type;
        }
        self.urgency = urgency;
        if scheduled_date.is_some() {
            self.scheduled_date = scheduled_date;
        }
        if let Some(budget) = dto.budget {
            self.budget = budget;
        }
        if let Some(location) = dto.location {
            self.location = location;
        }
        if let Some(deadline) = deadline {
            self.deadline = deadline;
        }
        Ok(())
    }

    pub fn feature(&mut self, user: &ObjectId, until: DateTime, now: DateTime) -> JobResult<()> {
        self.ensure_creator(user, "Only the job creator can feature this job")?;
        self.ensure_status(JobStatus::Open, "feature the job")?;
        require_future("Featured until", until, now)?;
        self.featured = true;
        self.featured_until = Some(until);
        Ok(())
    }

    /// Normalization run before every write.
    pub fn prepare_for_save(&mut self, now: DateTime) {
        self.skills_required = normalize_skills(&self.skills_required);
        if self.featured && self.featured_until.map(|until| until < now).unwrap_or(false) {
            self.featured = false;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::application::{TimeEstimate, TimeUnit};
    use crate::models::fixtures::*;

    #[test]
    fn creator_can_never_apply() {
        let hirer = ObjectId::new();
        let job = open_job(hirer);
        assert!(!job.can_apply(&hirer, now()));
        assert_eq!(
            job.check_can_apply(&hirer, now()),
            Err(JobError::Unauthorized("You cannot apply to your own job"))
        );
    }

    #[test]
    fn cannot_apply_after_deadline_or_when_not_open() {
        let hirer = ObjectId::new();
        let fixer = ObjectId::new();
        let mut job = open_job(hirer);
        assert!(job.can_apply(&fixer, now()));
        assert!(!job.can_apply(&fixer, at(now().timestamp_millis() + 8 * DAY)));

        job.status = JobStatus::Cancelled;
        assert!(!job.can_apply(&fixer, now()));
    }

    #[test]
    fn one_active_application_per_fixer() {
        let hirer = ObjectId::new();
        let fixer = ObjectId::new();
        let mut job = open_job(hirer);
        job.apply(fixer, proposal(450.0), now()).unwrap();

        let second = job.apply(fixer, proposal(400.0), now());
        assert!(matches!(second, Err(JobError::InvalidState(_))));
        assert_eq!(job.applications.len(), 1);
    }

    #[test]
    fn reapplying_after_withdrawal_is_allowed() {
        let hirer = ObjectId::new();
        let fixer = ObjectId::new();
        let mut job = open_job(hirer);
        let first = job.apply(fixer, proposal(450.0), now()).unwrap();
        assert_eq!(job.withdraw_application(&fixer).unwrap(), first);
        assert!(job.can_apply(&fixer, now()));

        let second = job.apply(fixer, proposal(420.0), now()).unwrap();
        assert_ne!(first, second);
        assert_eq!(job.application_by_fixer(&fixer).map(|a| a.id), Some(second));
        assert_eq!(job.active_application_count(), 1);
    }

    #[test]
    fn application_lookup_by_fixer() {
        let hirer = ObjectId::new();
        let fixer = ObjectId::new();
        let mut job = open_job(hirer);
        assert!(job.application_by_fixer(&fixer).is_none());
        job.apply(fixer, proposal(300.0), now()).unwrap();
        let found = job.application_by_fixer(&fixer).unwrap();
        assert_eq!(found.proposed_amount, 300.0);
        assert_eq!(found.status, ApplicationStatus::Pending);
    }

    #[test]
    fn accepting_one_rejects_all_siblings() {
        let hirer = ObjectId::new();
        let mut job = open_job(hirer);
        let fixers: Vec<ObjectId> = (0..4).map(|_| ObjectId::new()).collect();
        let ids: Vec<ObjectId> = fixers
            .iter()
            .map(|f| job.apply(*f, proposal(400.0), now()).unwrap())
            .collect();

        let hired = job.accept_application(&hirer, &ids[2], now()).unwrap();
        assert_eq!(hired, fixers[2]);

        let accepted = job.applications.iter().filter(|a| a.status == ApplicationStatus::Accepted).count();
        let rejected = job.applications.iter().filter(|a| a.status == ApplicationStatus::Rejected).count();
        assert_eq!(accepted, 1);
        assert_eq!(rejected, 3);
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.assigned_to, Some(fixers[2]));
        assert_eq!(job.progress.started_at, Some(now()));
    }

    #[test]
    fn accept_refuses_a_second_transition() {
        let (mut job, hirer, _) = assigned_job();
        let late_fixer = ObjectId::new();
        job.applications.push(Application {
            id: ObjectId::new(),
            fixer: late_fixer,
            proposed_amount: 10.0,
            time_estimate: TimeEstimate { value: 1, unit: TimeUnit::Hours },
            materials_list: Vec::new(),
            cover_letter: None,
            status: ApplicationStatus::Pending,
            applied_at: now(),
        });
        let late_id = job.applications[1].id;

        let result = job.accept_application(&hirer, &late_id, now());
        assert!(matches!(result, Err(JobError::InvalidState(_))));
        assert_ne!(job.assigned_to, Some(late_fixer));
    }

    #[test]
    fn accept_distinguishes_failure_causes() {
        let hirer = ObjectId::new();
        let fixer = ObjectId::new();
        let mut job = open_job(hirer);
        let app = job.apply(fixer, proposal(450.0), now()).unwrap();

        assert!(matches!(
            job.accept_application(&fixer, &app, now()),
            Err(JobError::Unauthorized(_))
        ));
        assert_eq!(
            job.accept_application(&hirer, &ObjectId::new(), now()),
            Err(JobError::NotFound("Application"))
        );
        assert_eq!(job.status, JobStatus::Open);
    }

    #[test]
    fn mark_done_by_stranger_changes_nothing() {
        let (mut job, hirer, _) = assigned_job();
        for stranger in [hirer, ObjectId::new()] {
            let result = job.mark_done(&stranger, None, Vec::new(), now());
            assert!(matches!(result, Err(JobError::Unauthorized(_))));
            assert_eq!(job.status, JobStatus::InProgress);
            assert!(job.completion.completed_at.is_none());
        }
    }

    #[test]
    fn mark_done_requires_in_progress() {
        let hirer = ObjectId::new();
        let mut job = open_job(hirer);
        job.assigned_to = Some(ObjectId::new());
        let fixer = job.assigned_to.unwrap();
        assert!(matches!(
            job.mark_done(&fixer, None, Vec::new(), now()),
            Err(JobError::InvalidState(_))
        ));
        assert_eq!(job.status, JobStatus::Open);
    }

    #[test]
    fn confirm_is_a_no_op_unless_completed() {
        let (mut job, hirer, _) = assigned_job();
        let before = job.completion.clone();
        let result = job.confirm_completion(&hirer, 5, None, now());
        assert!(matches!(result, Err(JobError::InvalidState(_))));
        assert_eq!(job.status, JobStatus::InProgress);
        assert!(job.completion.confirmed_at.is_none());
        assert!(job.completion.fixer_rating.is_none());
        assert_eq!(job.completion.confirmed_by, before.confirmed_by);
    }

    #[test]
    fn confirm_rejects_out_of_range_rating() {
        let (mut job, hirer, fixer) = assigned_job();
        job.mark_done(&fixer, None, Vec::new(), now()).unwrap();
        assert!(matches!(
            job.confirm_completion(&hirer, 6, None, now()),
            Err(JobError::Validation(_))
        ));
        assert!(job.completion.confirmed_at.is_none());
    }

    #[test]
    fn full_hire_to_confirmation_flow() {
        let hirer = ObjectId::new();
        let fixer = ObjectId::new();
        let mut job = open_job(hirer);
        assert_eq!(job.budget.budget_type, BudgetType::Fixed);
        assert_eq!(job.budget.amount, Some(500.0));

        let app = job.apply(fixer, proposal(450.0), now()).unwrap();
        job.accept_application(&hirer, &app, now()).unwrap();
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.assigned_to, Some(fixer));
        assert_eq!(job.application_by_fixer(&fixer).unwrap().status, ApplicationStatus::Accepted);

        let done_at = at(now().timestamp_millis() + DAY);
        job.mark_done(
            &fixer,
            Some("Replaced the washer".to_string()),
            vec!["https://img.example/after.jpg".to_string()],
            done_at,
        )
        .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress.marked_done_at, Some(done_at));
        assert_eq!(job.completion.completed_at, Some(done_at));

        let confirmed_at = at(done_at.timestamp_millis() + MINUTE);
        job.confirm_completion(&hirer, 5, Some("Quick and tidy".to_string()), confirmed_at)
            .unwrap();
        assert_eq!(job.completion.confirmed_at, Some(confirmed_at));
        assert_eq!(job.completion.fixer_rating.as_ref().map(|r| r.rating), Some(5));
        assert_eq!(job.status, JobStatus::Completed);

        job.rate_hirer(&fixer, 4, None, confirmed_at).unwrap();
        assert!(job.rate_hirer(&fixer, 4, None, confirmed_at).is_err());
        assert_eq!(job.completion.hirer_rating.as_ref().map(|r| r.rating), Some(4));
    }

    #[test]
    fn views_are_counted_once_per_user_per_day() {
        let hirer = ObjectId::new();
        let viewer = ObjectId::new();
        let mut job = open_job(hirer);

        assert!(job.add_view(&viewer, now()));
        assert!(!job.add_view(&viewer, now()));
        assert_eq!(job.views.count, 1);

        assert!(job.add_view(&viewer, at(now().timestamp_millis() + 2 * DAY)));
        assert_eq!(job.views.count, 2);

        assert!(!job.add_view(&hirer, now()));
        assert_eq!(job.views.count, 2);
    }

    #[test]
    fn view_log_keeps_the_latest_hundred() {
        let mut job = open_job(ObjectId::new());
        let viewers: Vec<ObjectId> = (0..120).map(|_| ObjectId::new()).collect();
        for viewer in &viewers {
            job.add_view(viewer, now());
        }
        assert_eq!(job.views.count, 120);
        assert_eq!(job.views.viewed_by.len(), VIEW_LOG_CAP);
        assert_eq!(job.views.viewed_by[0].user, viewers[20]);
        assert_eq!(job.views.viewed_by[99].user, viewers[119]);
    }

    #[test]
    fn dispute_by_outsider_is_refused() {
        let (mut job, _, _) = assigned_job();
        let result = job.raise_dispute(&ObjectId::new(), dispute_dto(), now());
        assert!(matches!(result, Err(JobError::Unauthorized(_))));
        assert!(!job.dispute.raised);
        assert_eq!(job.status, JobStatus::InProgress);
    }

    #[test]
    fn dispute_forces_disputed_from_completed() {
        let (mut job, hirer, fixer) = assigned_job();
        job.mark_done(&fixer, None, Vec::new(), now()).unwrap();
        job.raise_dispute(&hirer, dispute_dto(), now()).unwrap();

        assert_eq!(job.status, JobStatus::Disputed);
        assert!(job.dispute.raised);
        assert_eq!(job.dispute.raised_by, Some(hirer));
        assert_eq!(job.dispute.status, DisputeStatus::Pending);
        assert_eq!(job.dispute.evidence.len(), 1);

        assert!(matches!(
            job.raise_dispute(&fixer, dispute_dto(), now()),
            Err(JobError::InvalidState(_))
        ));
    }

    #[test]
    fn cancelled_job_cannot_be_disputed() {
        let (mut job, hirer, fixer) = assigned_job();
        job.cancel(&hirer, "Found someone closer".to_string(), None, now()).unwrap();

        for user in [hirer, fixer] {
            assert!(matches!(
                job.raise_dispute(&user, dispute_dto(), now()),
                Err(JobError::InvalidState(_))
            ));
        }
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(!job.dispute.raised);
    }

    #[test]
    fn dispute_resolution_moves_forward_only() {
        let (mut job, hirer, _) = assigned_job();
        let admin = ObjectId::new();
        assert!(job.resolve_dispute(&admin, DisputeStatus::Investigating, None, now()).is_err());

        job.raise_dispute(&hirer, dispute_dto(), now()).unwrap();
        job.resolve_dispute(&admin, DisputeStatus::Investigating, None, now()).unwrap();
        assert!(job.resolve_dispute(&admin, DisputeStatus::Pending, None, now()).is_err());
        assert!(matches!(
            job.resolve_dispute(&admin, DisputeStatus::Resolved, None, now()),
            Err(JobError::Validation(_))
        ));

        job.resolve_dispute(&admin, DisputeStatus::Resolved, Some("Partial refund".to_string()), now())
            .unwrap();
        assert_eq!(job.dispute.resolved_by, Some(admin));
        assert_eq!(job.status, JobStatus::Disputed);
        assert!(job.resolve_dispute(&admin, DisputeStatus::Closed, None, now()).is_err());
    }

    #[test]
    fn cancel_by_party_while_active() {
        let (mut job, _, fixer) = assigned_job();
        assert!(job.cancel(&ObjectId::new(), "No longer needed".to_string(), None, now()).is_err());

        job.cancel(&fixer, "Fell ill".to_string(), Some(100.0), now()).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.cancellation.cancelled);
        assert_eq!(job.cancellation.cancelled_by, Some(fixer));
        assert_eq!(job.cancellation.refund_amount, Some(100.0));

        assert!(matches!(
            job.cancel(&fixer, "Again".to_string(), None, now()),
            Err(JobError::InvalidState(_))
        ));
    }

    #[test]
    fn replies_need_an_existing_comment() {
        let mut job = open_job(ObjectId::new());
        let asker = ObjectId::new();
        let comment = job.add_comment(asker, "Is parking available?".to_string(), now()).unwrap();
        job.add_reply(&comment, job.created_by, "Yes, in front.".to_string(), now()).unwrap();
        assert_eq!(job.comments[0].replies.len(), 1);

        assert_eq!(
            job.add_reply(&ObjectId::new(), asker, "Thanks".to_string(), now()),
            Err(JobError::NotFound("Comment"))
        );
    }

    #[test]
    fn messages_between_parties_only() {
        let (mut job, hirer, fixer) = assigned_job();
        assert!(job.add_message(ObjectId::new(), "hi".to_string(), now()).is_err());

        job.add_message(hirer, "When can you come?".to_string(), now()).unwrap();
        job.add_message(hirer, "Any update?".to_string(), now()).unwrap();
        job.add_message(fixer, "Tomorrow".to_string(), now()).unwrap();

        assert_eq!(job.mark_messages_read(&fixer).unwrap(), 2);
        assert_eq!(job.mark_messages_read(&fixer).unwrap(), 0);
        assert!(!job.messages[2].read);
    }

    #[test]
    fn milestones_belong_to_the_assignee() {
        let (mut job, hirer, fixer) = assigned_job();
        assert!(job.add_milestone(&hirer, "Buy parts".to_string()).is_err());
        let id = job.add_milestone(&fixer, "Buy parts".to_string()).unwrap();
        job.complete_milestone(&fixer, &id, now()).unwrap();
        assert!(job.progress.milestones[0].completed);
        assert!(job.complete_milestone(&fixer, &id, now()).is_err());
    }

    #[test]
    fn skills_are_normalized_on_save() {
        let mut job = Job::new(ObjectId::new(), create_dto(vec!["Plumbing", " ELECTRICAL "]), now()).unwrap();
        assert_eq!(job.skills_required, vec!["plumbing", "electrical"]);

        job.skills_required.push("  Carpentry".to_string());
        job.prepare_for_save(now());
        assert_eq!(job.skills_required, vec!["plumbing", "electrical", "carpentry"]);
    }

    #[test]
    fn expired_feature_is_cleared_on_save() {
        let mut job = open_job(ObjectId::new());
        job.featured = true;
        job.featured_until = Some(at(now().timestamp_millis() - DAY));
        job.prepare_for_save(now());
        assert!(!job.featured);

        let creator = job.created_by;
        job.feature(&creator, at(now().timestamp_millis() + DAY), now()).unwrap();
        job.prepare_for_save(now());
        assert!(job.featured);
    }

    #[test]
    fn creation_rejects_past_dates() {
        let mut dto = create_dto(vec!["plumbing"]);
        dto.deadline = utc(now());
        assert!(matches!(Job::new(ObjectId::new(), dto, now()), Err(JobError::Validation(_))));

        let mut dto = create_dto(vec!["plumbing"]);
        dto.urgency = Some(Urgency::Scheduled);
        dto.scheduled_date = Some(utc(at(now().timestamp_millis() - MINUTE)));
        assert!(Job::new(ObjectId::new(), dto, now()).is_err());

        let mut dto = create_dto(vec!["plumbing"]);
        dto.budget.amount = None;
        assert!(Job::new(ObjectId::new(), dto, now()).is_err());
    }

    #[test]
    fn update_details_only_validates_fields_being_set() {
        let hirer = ObjectId::new();
        let mut job = open_job(hirer);
        let later = at(now().timestamp_millis() + 30 * DAY);

        // Deadline untouched even though it is now in the past relative to `later`.
        let dto = UpdateJobDetailsDto {
            title: Some("Fix the bathroom sink".to_string()),
            ..UpdateJobDetailsDto::default()
        };
        job.update_details(&hirer, dto, later).unwrap();
        assert_eq!(job.title, "Fix the bathroom sink");

        let dto = UpdateJobDetailsDto {
            deadline: Some(utc(now())),
            ..UpdateJobDetailsDto::default()
        };
        assert!(job.update_details(&hirer, dto, later).is_err());

        let dto = UpdateJobDetailsDto::default();
        assert!(matches!(
            job.update_details(&ObjectId::new(), dto, now()),
            Err(JobError::Unauthorized(_))
        ));
    }
}
