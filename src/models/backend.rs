use serde::{ Serialize, Deserialize };
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseFieldError {
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentType {
    #[serde(rename = "Illegal Dumping")]
    IllegalDumping,
    #[serde(rename = "Water Pollution")]
    WaterPollution,
    #[serde(rename = "Air Pollution")]
    AirPollution,
    #[serde(rename = "Illegal Logging")]
    IllegalLogging,
    #[serde(rename = "Wildlife Crime")]
    WildlifeCrime,
    #[serde(rename = "Land Degradation")]
    LandDegradation,
    #[serde(rename = "Coastal Damage")]
    CoastalDamage,
    #[serde(rename = "Other")]
    Other,
}

impl IncidentType {
    pub const ALL: [IncidentType; 8] = [
        IncidentType::IllegalDumping,
        IncidentType::WaterPollution,
        IncidentType::AirPollution,
        IncidentType::IllegalLogging,
        IncidentType::WildlifeCrime,
        IncidentType::LandDegradation,
        IncidentType::CoastalDamage,
        IncidentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::IllegalDumping => "Illegal Dumping",
            IncidentType::WaterPollution => "Water Pollution",
            IncidentType::AirPollution => "Air Pollution",
            IncidentType::IllegalLogging => "Illegal Logging",
            IncidentType::WildlifeCrime => "Wildlife Crime",
            IncidentType::LandDegradation => "Land Degradation",
            IncidentType::CoastalDamage => "Coastal Damage",
            IncidentType::Other => "Other",
        }
    }
}

impl Default for IncidentType {
    fn default() -> Self {
        IncidentType::IllegalDumping
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the display name in any case, with spaces, dashes or underscores
/// ("water-pollution", "Water Pollution").
impl FromStr for IncidentType {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['-', '_'], " ");
        IncidentType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().to_lowercase() == wanted)
            .ok_or_else(|| ParseFieldError {
                message: format!("Invalid incident type: '{}'", s),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Fil,
    Ceb,
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fil => "fil",
            Language::Ceb => "ceb",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "fil" | "filipino" | "tagalog" => Ok(Language::Fil),
            "ceb" | "cebuano" => Ok(Language::Ceb),
            _ =>
                Err(ParseFieldError {
                    message: format!("Invalid language: '{}' (expected en, fil or ceb)", s),
                }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    PendingVerification,
    Verified,
    InProgress,
    Resolved,
    Rejected,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 5] = [
        ReportStatus::PendingVerification,
        ReportStatus::Verified,
        ReportStatus::InProgress,
        ReportStatus::Resolved,
        ReportStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::PendingVerification => "pending_verification",
            ReportStatus::Verified => "verified",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Rejected => "rejected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportStatus::PendingVerification => "Pending",
            ReportStatus::Verified => "Verified",
            ReportStatus::InProgress => "In Progress",
            ReportStatus::Resolved => "Resolved",
            ReportStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['-', ' '], "_");
        ReportStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == wanted || status.label().to_lowercase().replace(' ', "_") == wanted)
            .ok_or_else(|| ParseFieldError {
                message: format!("Invalid report status: '{}'", s),
            })
    }
}

/// Body of `POST /api/reports`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSubmission {
    pub reporter_name: String,
    pub reporter_phone: String,
    pub description: String,
    pub location: String,
    pub incident_type: IncidentType,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportReceipt {
    pub id: String,
    pub trust_score: f64,
}

impl ReportReceipt {
    /// First eight characters of the report id, as shown to the reporter.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((end, _)) => &self.id[..end],
            None => &self.id,
        }
    }
}

/// Body of `POST /api/contact`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub organization: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    #[serde(default)]
    pub reporter_name: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub incident_type: String,
    #[serde(default)]
    pub language: String,
    pub trust_score: f64,
    pub status: String,
    #[serde(default)]
    pub ai_classification: Option<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Report {
    /// Parsed status, `None` when the backend sends a value we do not know.
    pub fn status(&self) -> Option<ReportStatus> {
        self.status.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub organization: Option<String>,
    pub message: String,
    pub created_at: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_reports: u64,
    pub verified_reports: u64,
    pub pending_reports: u64,
    pub resolved_reports: u64,
    pub total_contacts: u64,
    #[serde(default)]
    pub incident_types: BTreeMap<String, u64>,
}
