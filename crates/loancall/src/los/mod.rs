//! One-way push of loan applications to the loan-origination system.

pub mod client;
pub mod payload;
pub mod push;

pub use client::{client_from_config, EncompassClient, LosClient, LosError, SimulatedLos};
pub use payload::{Borrower, LoanPayload, LoanTerms};
pub use push::{LosPusher, PushError, PushOutcome};
