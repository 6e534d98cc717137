//! Job card (repair order) documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::counter::YearMonth;
use super::trim_in_place;

pub const JOBCARDS: &str = "jobcards";

/// Job card status. Any status may move to any other, including reopening `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobCardStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Closed,
}

impl JobCardStatus {
    pub const ALL: [JobCardStatus; 3] = [
        JobCardStatus::Open,
        JobCardStatus::InProgress,
        JobCardStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobCardStatus::Open => "Open",
            JobCardStatus::InProgress => "In Progress",
            JobCardStatus::Closed => "Closed",
        }
    }

    /// Status-filtered collection holding every job card currently in this status.
    pub fn collection(&self) -> &'static str {
        match self {
            JobCardStatus::Open => "openJobcards",
            JobCardStatus::InProgress => "inProgressJobcards",
            JobCardStatus::Closed => "closedJobcards",
        }
    }
}

impl fmt::Display for JobCardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkType {
    #[serde(rename = "General Service")]
    GeneralService,
    #[serde(rename = "Running Repair")]
    RunningRepair,
    #[serde(rename = "Body Shop")]
    BodyShop,
}

/// Job card document. Customer and vehicle fields are copied at creation and
/// never follow later customer edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCard {
    pub id: String,
    pub jobcard_number: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date_created: DateTime<Utc>,
    pub vehicle_registration: String,
    pub customer_name: String,
    pub mobile_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gst_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chassis_number: Option<String>,
    pub kilometer: u64,
    pub model: String,
    pub work_type: WorkType,
    pub complaints: Vec<String>,
    pub status: JobCardStatus,
}

impl JobCard {
    pub fn year_month(&self) -> YearMonth {
        YearMonth::of(&self.date_created)
    }
}

/// Input for opening a job card.
#[derive(Debug, Clone, Validate)]
pub struct CreateJobCard {
    #[validate(length(min = 1, message = "Vehicle registration cannot be empty"))]
    pub vehicle_registration: String,
    #[validate(length(min = 1, message = "Customer name cannot be empty"))]
    pub customer_name: String,
    #[validate(length(min = 1, message = "Mobile number cannot be empty"))]
    pub mobile_number: String,
    pub gst_number: Option<String>,
    pub address: Option<String>,
    pub chassis_number: Option<String>,
    pub kilometer: u64,
    pub model: String,
    pub work_type: WorkType,
    pub complaints: Vec<String>,
    /// Creation time; defaults to now.
    pub date_created: Option<DateTime<Utc>>,
}

impl CreateJobCard {
    pub fn trimmed(mut self) -> Self {
        trim_in_place(&mut self.vehicle_registration);
        trim_in_place(&mut self.customer_name);
        trim_in_place(&mut self.mobile_number);
        self
    }
}

/// Input for editing a job card. Status changes go through the status workflow.
#[derive(Debug, Clone, Default)]
pub struct UpdateJobCard {
    pub vehicle_registration: Option<String>,
    pub customer_name: Option<String>,
    pub mobile_number: Option<String>,
    pub gst_number: Option<String>,
    pub address: Option<String>,
    pub chassis_number: Option<String>,
    pub kilometer: Option<u64>,
    pub model: Option<String>,
    pub work_type: Option<WorkType>,
    pub complaints: Option<Vec<String>>,
}

impl UpdateJobCard {
    pub fn apply(self, card: &mut JobCard) {
        if let Some(v) = self.vehicle_registration {
            card.vehicle_registration = v;
        }
        if let Some(v) = self.customer_name {
            card.customer_name = v;
        }
        if let Some(v) = self.mobile_number {
            card.mobile_number = v;
        }
        if let Some(v) = self.gst_number {
            card.gst_number = Some(v);
        }
        if let Some(v) = self.address {
            card.address = Some(v);
        }
        if let Some(v) = self.chassis_number {
            card.chassis_number = Some(v);
        }
        if let Some(v) = self.kilometer {
            card.kilometer = v;
        }
        if let Some(v) = self.model {
            card.model = v;
        }
        if let Some(v) = self.work_type {
            card.work_type = v;
        }
        if let Some(v) = self.complaints {
            card.complaints = v;
        }
    }
}

/// One page of a server-side job card query.
#[derive(Debug, Clone)]
pub struct JobCardPage {
    pub items: Vec<JobCard>,
    /// Pass back as the cursor to fetch the next page; `None` when exhausted.
    pub next_cursor: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_with_display_names() {
        let json = serde_json::to_value(JobCardStatus::InProgress).unwrap();
        assert_eq!(json, serde_json::json!("In Progress"));
        let work: WorkType = serde_json::from_value(serde_json::json!("Body Shop")).unwrap();
        assert_eq!(work, WorkType::BodyShop);
    }

    #[test]
    fn every_status_has_its_own_collection() {
        let mut names: Vec<_> = JobCardStatus::ALL.iter().map(|s| s.collection()).collect();
        names.dedup();
        assert_eq!(names, vec!["openJobcards", "inProgressJobcards", "closedJobcards"]);
    }
}
