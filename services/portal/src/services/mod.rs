//! Business operations behind the HTTP routes

pub mod advising;
pub mod auth;

pub use advising::{AdvisingService, FormDetail, PlanSubmission};
pub use auth::{AuthService, AuthSettings, ProfileChanges, Registration, Session};
