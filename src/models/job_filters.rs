use mongodb::bson::{doc, Document};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Deserialize;

use super::job::{JobStatus, JobType, Urgency};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Documents to skip for a 1-based page. Pages too far out to address are an error.
pub fn page_offset(page: i64, limit: i64) -> Result<u64, String> {
    page.max(1)
        .checked_sub(1)
        .and_then(|p| p.checked_mul(limit.max(0)))
        .map(|offset| offset as u64)
        .ok_or_else(|| format!("Page {} is out of range", page))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobSort {
    /// Featured first, then newest.
    #[default]
    Relevance,
    Newest,
    Deadline,
    BudgetHigh,
    BudgetLow,
}

impl JobSort {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "relevance" | "featured" => Some(JobSort::Relevance),
            "newest" => Some(JobSort::Newest),
            "deadline" => Some(JobSort::Deadline),
            "budget_high" => Some(JobSort::BudgetHigh),
            "budget_low" => Some(JobSort::BudgetLow),
            _ => None,
        }
    }

    pub fn document(&self) -> Document {
        match self {
            JobSort::Relevance => doc! { "featured": -1, "created_at": -1 },
            JobSort::Newest => doc! { "created_at": -1 },
            JobSort::Deadline => doc! { "deadline": 1 },
            JobSort::BudgetHigh => doc! { "budget.amount": -1 },
            JobSort::BudgetLow => doc! { "budget.amount": 1 },
        }
    }
}

/// Query string of the public browse endpoint.
#[derive(Debug, Clone, Default, FromForm, Deserialize, JsonSchema)]
pub struct JobFilters {
    pub city: Option<String>,
    /// Comma-separated skills
    pub skills: Option<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub urgency: Option<String>,
    pub job_type: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl JobFilters {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn skip(&self) -> Result<u64, String> {
        page_offset(self.page(), self.limit())
    }

    pub fn sort(&self) -> Result<JobSort, String> {
        match &self.sort_by {
            None => Ok(JobSort::default()),
            Some(value) => JobSort::parse(value).ok_or_else(|| format!("Unknown sort '{}'", value)),
        }
    }

    pub fn skill_list(&self) -> Vec<String> {
        self.skills
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// MongoDB filter over open jobs.
    pub fn filter_document(&self) -> Result<Document, String> {
        let mut filter = doc! { "status": JobStatus::Open.as_str() };

        if let Some(city) = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            filter.insert(
                "location.city",
                doc! { "$regex": regex::escape(city), "$options": "i" },
            );
        }

        let skills = self.skill_list();
        if !skills.is_empty() {
            filter.insert("skills_required", doc! { "$in": skills });
        }

        if let (Some(min), Some(max)) = (self.budget_min, self.budget_max) {
            if min > max {
                return Err("budget_min cannot exceed budget_max".to_string());
            }
        }
        let mut budget = Document::new();
        if let Some(min) = self.budget_min {
            budget.insert("$gte", min);
        }
        if let Some(max) = self.budget_max {
            budget.insert("$lte", max);
        }
        if !budget.is_empty() {
            filter.insert("budget.amount", budget);
        }

        if let Some(urgency) = &self.urgency {
            let urgency = parse_urgency(urgency).ok_or_else(|| format!("Unknown urgency '{}'", urgency))?;
            filter.insert("urgency", urgency.as_str());
        }

        if let Some(job_type) = &self.job_type {
            let job_type = parse_job_type(job_type).ok_or_else(|| format!("Unknown job type '{}'", job_type))?;
            filter.insert("job_type", job_type.as_str());
        }

        Ok(filter)
    }

    /// Stable key for the response cache.
    pub fn cache_key(&self) -> String {
        format!(
            "jobs:browse:city={}|skills={}|min={:?}|max={:?}|urgency={}|type={}|sort={}|page={}|limit={}",
            self.city.as_deref().unwrap_or_default().trim().to_lowercase(),
            self.skill_list().join(","),
            self.budget_min,
            self.budget_max,
            self.urgency.as_deref().unwrap_or_default(),
            self.job_type.as_deref().unwrap_or_default(),
            self.sort_by.as_deref().unwrap_or_default(),
            self.page(),
            self.limit(),
        )
    }
}

fn parse_urgency(value: &str) -> Option<Urgency> {
    match value.trim().to_lowercase().as_str() {
        "asap" => Some(Urgency::Asap),
        "flexible" => Some(Urgency::Flexible),
        "scheduled" => Some(Urgency::Scheduled),
        _ => None,
    }
}

fn parse_job_type(value: &str) -> Option<JobType> {
    match value.trim().to_lowercase().as_str() {
        "one-time" | "one_time" => Some(JobType::OneTime),
        "recurring" => Some(JobType::Recurring),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_select_open_jobs() {
        let filter = JobFilters::default().filter_document().unwrap();
        assert_eq!(filter, doc! { "status": "open" });
    }

    #[test]
    fn city_match_is_case_insensitive_and_escaped() {
        let filters = JobFilters {
            city: Some(" New Delhi (NCR) ".to_string()),
            ..JobFilters::default()
        };
        let filter = filters.filter_document().unwrap();
        let city = filter.get_document("location.city").unwrap();
        assert_eq!(city.get_str("$regex").unwrap(), r"New Delhi \(NCR\)");
        assert_eq!(city.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn skills_and_budget_range() {
        let filters = JobFilters {
            skills: Some("Plumbing, ELECTRICAL,,".to_string()),
            budget_min: Some(100.0),
            budget_max: Some(900.0),
            urgency: Some("ASAP".to_string()),
            job_type: Some("recurring".to_string()),
            ..JobFilters::default()
        };
        let filter = filters.filter_document().unwrap();
        assert_eq!(
            filter.get_document("skills_required").unwrap(),
            &doc! { "$in": ["plumbing", "electrical"] }
        );
        assert_eq!(
            filter.get_document("budget.amount").unwrap(),
            &doc! { "$gte": 100.0, "$lte": 900.0 }
        );
        assert_eq!(filter.get_str("urgency").unwrap(), "asap");
        assert_eq!(filter.get_str("job_type").unwrap(), "recurring");
    }

    #[test]
    fn inverted_budget_range_is_rejected() {
        let filters = JobFilters {
            budget_min: Some(500.0),
            budget_max: Some(100.0),
            ..JobFilters::default()
        };
        assert!(filters.filter_document().is_err());
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let filters = JobFilters {
            urgency: Some("yesterday".to_string()),
            ..JobFilters::default()
        };
        assert!(filters.filter_document().is_err());

        let filters = JobFilters {
            sort_by: Some("popular".to_string()),
            ..JobFilters::default()
        };
        assert!(filters.sort().is_err());
    }

    #[test]
    fn sort_presets() {
        assert_eq!(JobSort::default().document(), doc! { "featured": -1, "created_at": -1 });
        assert_eq!(JobSort::parse("deadline").unwrap().document(), doc! { "deadline": 1 });
        assert_eq!(JobSort::parse("budget_high").unwrap().document(), doc! { "budget.amount": -1 });
        assert_eq!(JobSort::parse("budget_low").unwrap().document(), doc! { "budget.amount": 1 });
        assert_eq!(JobSort::parse("newest").unwrap().document(), doc! { "created_at": -1 });
    }

    #[test]
    fn paging_is_clamped() {
        let filters = JobFilters {
            page: Some(0),
            limit: Some(1000),
            ..JobFilters::default()
        };
        assert_eq!(filters.page(), 1);
        assert_eq!(filters.limit(), MAX_PAGE_SIZE);
        assert_eq!(filters.skip(), Ok(0));

        let filters = JobFilters {
            page: Some(3),
            ..JobFilters::default()
        };
        assert_eq!(filters.skip(), Ok(40));
    }

    #[test]
    fn huge_page_numbers_are_rejected() {
        let filters = JobFilters {
            page: Some(i64::MAX),
            ..JobFilters::default()
        };
        assert!(filters.skip().is_err());
        assert!(page_offset(i64::MAX / 10, MAX_PAGE_SIZE).is_err());
        assert_eq!(page_offset(i64::MIN, 20), Ok(0));
    }

    #[test]
    fn cache_key_ignores_case_and_spacing_of_skills() {
        let a = JobFilters {
            skills: Some("Plumbing,Electrical".to_string()),
            ..JobFilters::default()
        };
        let b = JobFilters {
            skills: Some(" plumbing , ELECTRICAL".to_string()),
            ..JobFilters::default()
        };
        assert_eq!(a.cache_key(), b.cache_key());
        assert!(a.cache_key().starts_with("jobs:"));
    }
}
