use crate::models::backend::{ ContactSubmission, ReportSubmission };
use thiserror::Error;

/// A required form field left blank. Caught before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please fill in description and location.")]
    ReportIncomplete { missing: Vec<&'static str> },
    #[error("Please fill in all required fields.")]
    ContactIncomplete { missing: Vec<&'static str> },
}

impl ValidationError {
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            ValidationError::ReportIncomplete { missing } => missing,
            ValidationError::ContactIncomplete { missing } => missing,
        }
    }
}

fn blank_fields(fields: &[(&'static str, &str)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for ReportSubmission {
    fn validate(&self) -> Result<(), ValidationError> {
        let missing = blank_fields(
            &[
                ("description", self.description.as_str()),
                ("location", self.location.as_str()),
            ]
        );
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ReportIncomplete { missing })
        }
    }
}

impl Validate for ContactSubmission {
    fn validate(&self) -> Result<(), ValidationError> {
        let missing = blank_fields(
            &[
                ("name", self.name.as_str()),
                ("email", self.email.as_str()),
                ("message", self.message.as_str()),
            ]
        );
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ContactIncomplete { missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_requires_description_and_location() {
        let mut report = ReportSubmission::default();
        let err = report.validate().unwrap_err();
        assert_eq!(err.missing_fields(), &["description", "location"]);
        assert_eq!(err.to_string(), "Please fill in description and location.");

        report.description = "Burning tires".into();
        report.location = "   ".into();
        assert_eq!(report.validate().unwrap_err().missing_fields(), &["location"]);

        report.location = "Davao".into();
        assert!(report.validate().is_ok());
    }

    #[test]
    fn contact_organization_is_optional() {
        let contact = ContactSubmission {
            name: "Ana".into(),
            email: "ana@example.org".into(),
            organization: String::new(),
            message: "We'd like to partner".into(),
        };
        assert!(contact.validate().is_ok());

        let err = ContactSubmission { message: String::new(), ..contact }.validate().unwrap_err();
        assert_eq!(err.missing_fields(), &["message"]);
    }
}
