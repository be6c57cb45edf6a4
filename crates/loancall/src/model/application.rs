use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{UnknownVariant, ValidationError};

/// Review state of a loan application. The push to the LOS is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[serde(rename = "Review needed")]
    ReviewNeeded,
    #[serde(rename = "Ready for LOS")]
    ReadyForLos,
    #[serde(rename = "Pushed to Encompass")]
    PushedToEncompass,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::ReviewNeeded => "Review needed",
            ApplicationStatus::ReadyForLos => "Ready for LOS",
            ApplicationStatus::PushedToEncompass => "Pushed to Encompass",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Review needed" => Ok(ApplicationStatus::ReviewNeeded),
            "Ready for LOS" => Ok(ApplicationStatus::ReadyForLos),
            "Pushed to Encompass" => Ok(ApplicationStatus::PushedToEncompass),
            other => Err(UnknownVariant::new("application status", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanApplication {
    pub id: String,
    pub user_id: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub loan_amount: f64,
    pub loan_type: String,
    pub property_type: String,
    /// Percentage, e.g. `6.25`.
    pub interest_rate: f64,
    pub term_years: u32,
    /// Call this application was derived from, if any.
    pub call_id: Option<String>,
    pub status: ApplicationStatus,
    /// Loan ID assigned by the LOS; set exactly when status is `PushedToEncompass`.
    pub encompass_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanApplication {
    /// Validates the input and builds an application that has not been pushed.
    pub fn new(input: NewApplication) -> Result<Self, ValidationError> {
        input.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: input.user_id,
            client_name: input.client_name.trim().to_string(),
            client_email: input.contact.email,
            client_phone: input.contact.phone,
            loan_amount: input.loan_amount,
            loan_type: input.loan_type,
            property_type: input.property_type,
            interest_rate: input.interest_rate,
            term_years: input.term_years,
            call_id: input.call_id,
            status: input.status,
            encompass_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_pushed(&self) -> bool {
        self.status == ApplicationStatus::PushedToEncompass
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub user_id: String,
    pub client_name: String,
    pub contact: ClientContact,
    pub loan_amount: f64,
    pub loan_type: String,
    pub property_type: String,
    pub interest_rate: f64,
    pub term_years: u32,
    pub call_id: Option<String>,
    pub status: ApplicationStatus,
}

impl NewApplication {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.client_name.trim().is_empty() {
            return Err(ValidationError::Empty("client_name"));
        }
        if self.loan_type.trim().is_empty() {
            return Err(ValidationError::Empty("loan_type"));
        }
        if self.property_type.trim().is_empty() {
            return Err(ValidationError::Empty("property_type"));
        }
        if !(self.loan_amount.is_finite() && self.loan_amount > 0.0) {
            return Err(ValidationError::LoanAmount(self.loan_amount));
        }
        if !(self.interest_rate.is_finite() && self.interest_rate >= 0.0) {
            return Err(ValidationError::InterestRate(self.interest_rate));
        }
        if self.term_years == 0 {
            return Err(ValidationError::Term);
        }
        if self.status == ApplicationStatus::PushedToEncompass {
            return Err(ValidationError::PushedOnCreate);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewApplication {
        NewApplication {
            user_id: "user-1".to_string(),
            client_name: "Dana Whitfield".to_string(),
            contact: ClientContact::default(),
            loan_amount: 360_000.0,
            loan_type: "Conventional".to_string(),
            property_type: "Single Family Home".to_string(),
            interest_rate: 6.25,
            term_years: 30,
            call_id: None,
            status: ApplicationStatus::ReadyForLos,
        }
    }

    #[test]
    fn test_new_application_is_not_pushed() {
        let app = LoanApplication::new(input()).unwrap();
        assert!(!app.is_pushed());
        assert!(app.encompass_id.is_none());
    }

    #[test]
    fn test_rejects_non_positive_amount_and_zero_term() {
        let mut bad = input();
        bad.loan_amount = 0.0;
        assert_eq!(
            LoanApplication::new(bad).unwrap_err(),
            ValidationError::LoanAmount(0.0)
        );

        let mut bad = input();
        bad.term_years = 0;
        assert_eq!(LoanApplication::new(bad).unwrap_err(), ValidationError::Term);

        let mut bad = input();
        bad.interest_rate = -1.0;
        assert!(LoanApplication::new(bad).is_err());
    }

    #[test]
    fn test_cannot_create_already_pushed_application() {
        let mut bad = input();
        bad.status = ApplicationStatus::PushedToEncompass;
        assert_eq!(
            LoanApplication::new(bad).unwrap_err(),
            ValidationError::PushedOnCreate
        );
    }

    #[test]
    fn test_status_strings_match_dashboard_labels() {
        let json = serde_json::to_string(&ApplicationStatus::ReadyForLos).unwrap();
        assert_eq!(json, "\"Ready for LOS\"");
        assert_eq!(
            "Pushed to Encompass".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::PushedToEncompass
        );
        assert!("pushed".parse::<ApplicationStatus>().is_err());
    }
}
