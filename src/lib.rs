//! Mentorship onboarding: role and profile lifecycle for a mentoring
//! platform.

pub mod config;
pub mod error;
pub mod onboarding;
pub mod store;
