//! Record types shared by the CLI and the store layer
//!
//! Each record maps to exactly one backend table:
//! - Client: `clients`
//! - Packet: `packets` (proposal document with embedded photos and signature)
//! - Inspection: `inspections` (categorized photos and findings)
//! - Job: `jobs`
//! - Capture: `captures` (quick capture media tagged to a client)

use crate::categories::InspectionCategory;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row in a backend table.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Table name in the hosted database and the local mirror
    const TABLE: &'static str;

    fn id(&self) -> &str;
}

/// Generate a new record id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            phone: String::new(),
            email: String::new(),
            address: String::new(),
            notes: String::new(),
            created_at: Utc::now(),
        }
    }
}

impl Record for Client {
    const TABLE: &'static str = "clients";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketStatus {
    #[default]
    Draft,
    Sent,
    Signed,
    Declined,
}

impl PacketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketStatus::Draft => "draft",
            PacketStatus::Sent => "sent",
            PacketStatus::Signed => "signed",
            PacketStatus::Declined => "declined",
        }
    }
}

impl fmt::Display for PacketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PacketStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(PacketStatus::Draft),
            "sent" => Ok(PacketStatus::Sent),
            "signed" => Ok(PacketStatus::Signed),
            "declined" => Ok(PacketStatus::Declined),
            _ => Err(format!("Unknown packet status: {}. Use draft, sent, signed, or declined", s)),
        }
    }
}

/// Photo attached to a packet, stored in the bucket at `path`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketPhoto {
    pub path: String,
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub signer_name: String,
    pub path: String,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub id: String,
    pub client_id: String,
    pub title: String,
    #[serde(default)]
    pub scope: String,
    /// Quoted price in cents
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub status: PacketStatus,
    #[serde(default)]
    pub photos: Vec<PacketPhoto>,
    #[serde(default)]
    pub signature: Option<Signature>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Packet {
    pub fn new(client_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            client_id: client_id.into(),
            title: title.into(),
            scope: String::new(),
            amount_cents: None,
            status: PacketStatus::Draft,
            photos: Vec::new(),
            signature: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

impl Record for Packet {
    const TABLE: &'static str = "packets";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "l" | "minor" => Ok(Severity::Low),
            "medium" | "med" | "m" | "moderate" => Ok(Severity::Medium),
            "high" | "h" | "severe" | "critical" => Ok(Severity::High),
            _ => Err(format!("Unknown severity: {}. Use low, medium, or high", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionPhoto {
    pub path: String,
    pub category: InspectionCategory,
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub category: InspectionCategory,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub inspector: String,
    pub inspected_on: NaiveDate,
    #[serde(default)]
    pub roof_type: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub photos: Vec<InspectionPhoto>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    pub created_at: DateTime<Utc>,
}

impl Inspection {
    pub fn new(client_id: impl Into<String>, inspected_on: NaiveDate) -> Self {
        Self {
            id: new_id(),
            client_id: client_id.into(),
            inspector: String::new(),
            inspected_on,
            roof_type: String::new(),
            notes: String::new(),
            photos: Vec::new(),
            findings: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Finding counts as (high, medium, low)
    pub fn severity_counts(&self) -> (usize, usize, usize) {
        self.findings.iter().fold((0, 0, 0), |(h, m, l), f| match f.severity {
            Severity::High => (h + 1, m, l),
            Severity::Medium => (h, m + 1, l),
            Severity::Low => (h, m, l + 1),
        })
    }
}

impl Record for Inspection {
    const TABLE: &'static str = "inspections";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Scheduled => "scheduled",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Scheduled or in progress
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Scheduled | JobStatus::InProgress)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "scheduled" => Ok(JobStatus::Scheduled),
            "in_progress" | "started" => Ok(JobStatus::InProgress),
            "completed" | "complete" | "done" => Ok(JobStatus::Completed),
            "cancelled" | "canceled" => Ok(JobStatus::Cancelled),
            _ => Err(format!(
                "Unknown job status: {}. Use scheduled, in_progress, completed, or cancelled",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub packet_id: Option<String>,
    pub title: String,
    pub scheduled_on: NaiveDate,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default = "default_duration_hours")]
    pub duration_hours: f32,
    #[serde(default)]
    pub crew: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_duration_hours() -> f32 {
    8.0
}

impl Job {
    pub fn new(client_id: impl Into<String>, title: impl Into<String>, scheduled_on: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            client_id: client_id.into(),
            packet_id: None,
            title: title.into(),
            scheduled_on,
            start_time: None,
            duration_hours: default_duration_hours(),
            crew: None,
            status: JobStatus::Scheduled,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Job {
    const TABLE: &'static str = "jobs";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Voice,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Voice => "voice",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quick capture item tagged to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub id: String,
    pub client_id: String,
    pub kind: MediaKind,
    /// Object path in the bucket
    pub path: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub transcript: Option<String>,
    /// Capture time from EXIF, "YYYY-MM-DD HH:MM:SS"
    #[serde(default)]
    pub taken_at: Option<String>,
    #[serde(default)]
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Capture {
    pub fn new(client_id: impl Into<String>, kind: MediaKind, path: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            client_id: client_id.into(),
            kind,
            path: path.into(),
            tag: String::new(),
            note: String::new(),
            transcript: None,
            taken_at: None,
            content_hash: String::new(),
            created_at: Utc::now(),
        }
    }
}

impl Record for Capture {
    const TABLE: &'static str = "captures";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Format cents as "$1,234.56"
pub fn format_amount(cents: i64) -> String {
    let negative = cents < 0;
    let cents = cents.unsigned_abs();
    let dollars = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}${}.{:02}", if negative { "-" } else { "" }, grouped, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_status_roundtrip_names() {
        assert_eq!("Signed".parse::<PacketStatus>().unwrap(), PacketStatus::Signed);
        assert!("approved".parse::<PacketStatus>().is_err());
        let json = serde_json::to_string(&PacketStatus::Declined).unwrap();
        assert_eq!(json, "\"declined\"");
    }

    #[test]
    fn test_job_status_aliases() {
        assert_eq!("in progress".parse::<JobStatus>().unwrap(), JobStatus::InProgress);
        assert_eq!("done".parse::<JobStatus>().unwrap(), JobStatus::Completed);
        assert_eq!("canceled".parse::<JobStatus>().unwrap(), JobStatus::Cancelled);
        assert!(!JobStatus::Completed.is_active());
        assert!(JobStatus::InProgress.is_active());
    }

    #[test]
    fn test_job_deserialize_defaults() {
        let json = r#"{
            "id": "j1",
            "client_id": "c1",
            "title": "Tear-off",
            "scheduled_on": "2026-11-03",
            "created_at": "2026-10-01T00:00:00Z",
            "updated_at": "2026-10-01T00:00:00Z"
        }"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, JobStatus::Scheduled);
        assert_eq!(job.duration_hours, 8.0);
        assert!(job.start_time.is_none());
        assert!(job.packet_id.is_none());
    }

    #[test]
    fn test_severity_counts() {
        let mut inspection = Inspection::new("c1", NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        for severity in [Severity::High, Severity::Low, Severity::High, Severity::Medium] {
            inspection.findings.push(Finding {
                category: InspectionCategory::Shingles,
                severity,
                description: "x".into(),
                recommendation: String::new(),
            });
        }
        assert_eq!(inspection.severity_counts(), (2, 1, 1));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "$0.00");
        assert_eq!(format_amount(1_234_56), "$1,234.56");
        assert_eq!(format_amount(12_500_000), "$125,000.00");
        assert_eq!(format_amount(-99), "-$0.99");
    }

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(Client::new("a").id, Client::new("a").id);
    }
}
