use super::{ BackendError, ReportingBackend };
use crate::models::backend::{ Contact, IncidentType, Report, ReportStatus, Stats };
use std::fmt;

const RECENT_REPORTS: usize = 5;
const RECENT_CONTACTS: usize = 3;

/// Report list filter of the admin console. Unset criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub search: Option<String>,
    pub status: Option<ReportStatus>,
    pub incident_type: Option<IncidentType>,
}

impl ReportFilter {
    pub fn matches(&self, report: &Report) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                [&report.description, &report.location, &report.reporter_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
        };
        let matches_status = self.status.map_or(true, |s| report.status == s.as_str());
        let matches_type = self.incident_type.map_or(true, |t| report.incident_type == t.as_str());

        matches_search && matches_status && matches_type
    }

    pub fn apply<'a>(&self, reports: &'a [Report]) -> Vec<&'a Report> {
        reports
            .iter()
            .filter(|r| self.matches(r))
            .collect()
    }
}

/// Contact list search: case-insensitive over name, email, message and
/// organization.
#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub search: Option<String>,
}

impl ContactFilter {
    pub fn matches(&self, contact: &Contact) -> bool {
        let term = match self.search.as_deref().map(str::trim) {
            None | Some("") => return true,
            Some(term) => term.to_lowercase(),
        };
        [&contact.name, &contact.email, &contact.message]
            .into_iter()
            .chain(contact.organization.as_ref())
            .any(|field| field.to_lowercase().contains(&term))
    }

    pub fn apply<'a>(&self, contacts: &'a [Contact]) -> Vec<&'a Contact> {
        contacts
            .iter()
            .filter(|c| self.matches(c))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustBand {
    High,
    Medium,
    Low,
}

impl TrustBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            TrustBand::High
        } else if score >= 60.0 {
            TrustBand::Medium
        } else {
            TrustBand::Low
        }
    }
}

impl fmt::Display for TrustBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrustBand::High => "high",
            TrustBand::Medium => "medium",
            TrustBand::Low => "low",
        };
        f.pad(label)
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub stats: Stats,
    pub recent_reports: Vec<Report>,
    pub recent_contacts: Vec<Contact>,
}

/// Fetches stats, reports and contacts concurrently; any failure fails the
/// whole dashboard.
pub async fn load_dashboard(backend: &dyn ReportingBackend) -> Result<Dashboard, BackendError> {
    let (stats, mut reports, mut contacts) = tokio::try_join!(
        backend.stats(),
        backend.list_reports(),
        backend.list_contacts()
    )?;
    reports.truncate(RECENT_REPORTS);
    contacts.truncate(RECENT_CONTACTS);

    Ok(Dashboard {
        stats,
        recent_reports: reports,
        recent_contacts: contacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: &str, description: &str, location: &str, status: &str, incident_type: &str) -> Report {
        Report {
            id: id.into(),
            reporter_name: "Juan".into(),
            description: description.into(),
            location: location.into(),
            latitude: None,
            longitude: None,
            incident_type: incident_type.into(),
            language: "en".into(),
            trust_score: 70.0,
            status: status.into(),
            ai_classification: None,
            photo_urls: vec![],
            created_at: "2025-12-22T08:00:00".into(),
            updated_at: "2025-12-22T08:00:00".into(),
        }
    }

    fn sample() -> Vec<Report> {
        vec![
            report("1", "Garbage dumped near river", "Marikina", "verified", "Illegal Dumping"),
            report("2", "Black smoke from factory", "Valenzuela", "pending_verification", "Air Pollution"),
            report("3", "Mangroves cut", "Bohol coast", "resolved", "Coastal Damage")
        ]
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let reports = sample();
        assert_eq!(ReportFilter::default().apply(&reports).len(), 3);
        let blank = ReportFilter { search: Some("  ".into()), ..Default::default() };
        assert_eq!(blank.apply(&reports).len(), 3);
    }

    #[test]
    fn search_covers_description_location_and_reporter() {
        let reports = sample();
        let ids = |filter: ReportFilter| -> Vec<String> {
            filter.apply(&reports).iter().map(|r| r.id.clone()).collect()
        };
        assert_eq!(ids(ReportFilter { search: Some("SMOKE".into()), ..Default::default() }), vec!["2"]);
        assert_eq!(ids(ReportFilter { search: Some("bohol".into()), ..Default::default() }), vec!["3"]);
        assert_eq!(ids(ReportFilter { search: Some("juan".into()), ..Default::default() }).len(), 3);
    }

    #[test]
    fn status_and_type_filters_combine() {
        let reports = sample();
        let filter = ReportFilter {
            status: Some(ReportStatus::Verified),
            incident_type: Some(IncidentType::IllegalDumping),
            ..Default::default()
        };
        assert_eq!(filter.apply(&reports).len(), 1);

        let filter = ReportFilter {
            status: Some(ReportStatus::Verified),
            incident_type: Some(IncidentType::AirPollution),
            ..Default::default()
        };
        assert!(filter.apply(&reports).is_empty());
    }

    fn contact(id: &str, name: &str, email: &str, organization: Option<&str>, message: &str) -> Contact {
        Contact {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            organization: organization.map(String::from),
            message: message.into(),
            created_at: "2025-12-22T09:00:00".into(),
            status: "unread".into(),
        }
    }

    #[test]
    fn contact_search_covers_every_text_field() {
        let contacts = vec![
            contact("1", "Maria Santos", "maria@lgu.gov.ph", None, "Partnership inquiry"),
            contact("2", "Jun", "jun@example.org", Some("Save the Reefs"), "Volunteering"),
            contact("3", "Ana", "ana@school.edu", Some(""), "Pilot program for our students")
        ];
        let ids = |search: &str| -> Vec<String> {
            ContactFilter { search: Some(search.into()) }
                .apply(&contacts)
                .iter()
                .map(|c| c.id.clone())
                .collect()
        };
        assert_eq!(ids("SANTOS"), vec!["1"]);
        assert_eq!(ids("lgu.gov"), vec!["1"]);
        assert_eq!(ids("reefs"), vec!["2"]);
        assert_eq!(ids("pilot"), vec!["3"]);
        assert!(ids("mangrove").is_empty());
        assert_eq!(ids("  ").len(), 3);
        assert_eq!(ContactFilter::default().apply(&contacts).len(), 3);
    }

    #[test]
    fn trust_bands() {
        assert_eq!(TrustBand::from_score(92.0), TrustBand::High);
        assert_eq!(TrustBand::from_score(80.0), TrustBand::High);
        assert_eq!(TrustBand::from_score(60.0), TrustBand::Medium);
        assert_eq!(TrustBand::from_score(59.9), TrustBand::Low);
    }
}
