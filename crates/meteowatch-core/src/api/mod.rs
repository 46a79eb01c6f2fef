//! REST client module for the dashboard backend.
//!
//! This module provides the `AuthService` for the login, registration and
//! verification exchanges, and the authorized-call wrapper every data fetch
//! goes through.
//!
//! The backend uses JWT bearer tokens obtained from `/api/auth/login` or
//! `/api/auth/register`. A 401 on any authorized call ends the session.

pub mod client;
pub mod error;

pub use client::{AuthService, LoginSuccess, RequestOptions, SessionEvent};
pub use error::AuthError;
pub use reqwest::{Method, StatusCode};
