//! meteowatch-core - session and authentication core of the weather dashboard.
//!
//! Leaf-first:
//! - [`auth`]: the persisted session token and what it says about the user
//! - [`api`]: `AuthService`, the login/register exchanges and authorized calls
//! - [`session`]: `SessionContext`, the reactive session state machine
//! - [`routes`]: `RouteGate`, which keeps anonymous users off protected views
//! - [`readings`]: authorized polling of sensor readings

pub mod api;
pub mod auth;
pub mod config;
pub mod readings;
pub mod routes;
pub mod session;
pub mod utils;

pub use api::{AuthError, AuthService, LoginSuccess, RequestOptions, SessionEvent};
pub use auth::{Claims, TokenStore, User};
pub use config::{Config, TokenBackend};
pub use routes::{GateDecision, RouteGate, View};
pub use session::{SessionContext, SessionPhase, SessionState};
