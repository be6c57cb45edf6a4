use serde::Serialize;

use crate::model::LoanApplication;

/// Body of a loan creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanPayload {
    pub borrower: Borrower,
    pub loan: LoanTerms,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Borrower {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTerms {
    pub loan_amount: f64,
    pub loan_type: String,
    pub property_type: String,
    pub interest_rate: f64,
    /// Years.
    pub term: u32,
}

impl LoanPayload {
    pub fn from_application(app: &LoanApplication) -> Self {
        let (first_name, last_name) = split_name(&app.client_name);
        Self {
            borrower: Borrower {
                first_name,
                last_name,
                email: app.client_email.clone(),
                phone: app.client_phone.clone(),
            },
            loan: LoanTerms {
                loan_amount: app.loan_amount,
                loan_type: app.loan_type.clone(),
                property_type: app.property_type.clone(),
                interest_rate: app.interest_rate,
                term: app.term_years,
            },
        }
    }
}

/// First word is the first name; everything after it is the last name.
fn split_name(full: &str) -> (String, String) {
    let mut words = full.split_whitespace();
    let first = words.next().unwrap_or_default().to_string();
    let rest = words.collect::<Vec<_>>().join(" ");
    (first, rest)
}
