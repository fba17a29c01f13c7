//! Sample jobs shared by unit tests.

use chrono::TimeZone;
use mongodb::bson::{oid::ObjectId, DateTime};

use super::application::{ApplyDto, TimeEstimate, TimeUnit};
use super::job::*;

pub const MINUTE: i64 = 60 * 1000;
pub const DAY: i64 = 24 * 60 * MINUTE;

pub fn at(millis: i64) -> DateTime {
    DateTime::from_millis(millis)
}

pub fn now() -> DateTime {
    // 2026-01-15T12:00:00Z
    at(1_768_478_400_000)
}

pub fn utc(dt: DateTime) -> chrono::DateTime<chrono::Utc> {
    chrono::Utc.timestamp_millis_opt(dt.timestamp_millis()).unwrap()
}

pub fn create_dto(skills: Vec<&str>) -> CreateJobDto {
    CreateJobDto {
        title: "Fix leaking kitchen sink".to_string(),
        description: "The sink under the kitchen counter leaks when the tap runs.".to_string(),
        skills_required: skills.into_iter().map(String::from).collect(),
        experience_level: None,
        job_type: None,
        urgency: None,
        scheduled_date: None,
        budget: Budget {
            budget_type: BudgetType::Fixed,
            amount: Some(500.0),
            currency: "INR".to_string(),
            materials_included: false,
        },
        location: JobLocation {
            address: "12 MG Road".to_string(),
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            pincode: Some("411001".to_string()),
            coordinates: None,
        },
        deadline: utc(at(now().timestamp_millis() + 7 * DAY)),
        before_images: Vec::new(),
    }
}

pub fn open_job(hirer: ObjectId) -> Job {
    let mut job = Job::new(hirer, create_dto(vec!["plumbing"]), now()).unwrap();
    job.id = Some(ObjectId::new());
    job
}

pub fn proposal(amount: f64) -> ApplyDto {
    ApplyDto {
        proposed_amount: amount,
        time_estimate: TimeEstimate { value: 2, unit: TimeUnit::Days },
        materials_list: Vec::new(),
        cover_letter: Some("I have fixed many sinks.".to_string()),
    }
}

pub fn dispute_dto() -> RaiseDisputeDto {
    RaiseDisputeDto {
        reason: "Work incomplete".to_string(),
        description: "The leak is still there after the visit.".to_string(),
        evidence: vec!["https://img.example/leak.jpg".to_string()],
    }
}

/// Open job with one accepted fixer, returned as (job, hirer, fixer).
pub fn assigned_job() -> (Job, ObjectId, ObjectId) {
    let hirer = ObjectId::new();
    let fixer = ObjectId::new();
    let mut job = open_job(hirer);
    let app = job.apply(fixer, proposal(450.0), now()).unwrap();
    job.accept_application(&hirer, &app, now()).unwrap();
    (job, hirer, fixer)
}
