//! View table and the guard in front of protected views.
//!
//! `RouteGate` only reads `SessionState`; it never signs anyone in or out.

use crate::session::SessionState;

/// Path of the public login view
pub const LOGIN_PATH: &str = "/login";

/// Where a successful login lands when no origin was preserved
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Home,
    Temperature,
    Humidity,
}

impl View {
    pub const ALL: [View; 4] = [View::Login, View::Home, View::Temperature, View::Humidity];

    pub fn path(&self) -> &'static str {
        match self {
            View::Login => LOGIN_PATH,
            View::Home => HOME_PATH,
            View::Temperature => "/temperature",
            View::Humidity => "/humidity",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            View::Login => "Login",
            View::Home => "Home",
            View::Temperature => "Temperature",
            View::Humidity => "Humidity",
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, View::Login)
    }

    /// Match a location against the view table, ignoring query, fragment
    /// and a trailing slash.
    pub fn from_path(location: &str) -> Option<View> {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => HOME_PATH,
            trimmed => trimmed,
        };
        View::ALL.into_iter().find(|v| v.path() == path)
    }
}

/// Outcome of a navigation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Render(View),
    /// Navigate to `to`, replacing the current entry. `from` is the
    /// location to return to after a successful login.
    Redirect { to: String, from: Option<String> },
}

pub struct RouteGate;

impl RouteGate {
    pub fn check(state: &SessionState, requested: &str) -> GateDecision {
        Self::check_with_origin(state, requested, None)
    }

    /// Like `check`, with the location preserved by an earlier redirect.
    /// Only consulted when an authenticated user lands on the login view.
    pub fn check_with_origin(
        state: &SessionState,
        requested: &str,
        from: Option<&str>,
    ) -> GateDecision {
        let Some(view) = View::from_path(requested) else {
            // Unknown paths go to login without remembering them
            return GateDecision::Redirect {
                to: LOGIN_PATH.to_string(),
                from: None,
            };
        };

        match (view.is_protected(), state.is_authenticated) {
            (true, true) | (false, false) => GateDecision::Render(view),
            (true, false) => GateDecision::Redirect {
                to: LOGIN_PATH.to_string(),
                from: Some(requested.to_string()),
            },
            (false, true) => GateDecision::Redirect {
                to: Self::post_login_destination(from),
                from: None,
            },
        }
    }

    /// The preserved origin if it names a protected view, otherwise home
    pub fn post_login_destination(from: Option<&str>) -> String {
        from.filter(|loc| View::from_path(loc).is_some_and(|v| v.is_protected()))
            .unwrap_or(HOME_PATH)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::User;

    fn signed_in() -> SessionState {
        SessionState::authenticated(User {
            id: 1,
            username: "admin".to_string(),
        })
    }

    #[test]
    fn test_from_path() {
        assert_eq!(View::from_path("/"), Some(View::Home));
        assert_eq!(View::from_path(""), Some(View::Home));
        assert_eq!(View::from_path("/temperature"), Some(View::Temperature));
        assert_eq!(View::from_path("/humidity/"), Some(View::Humidity));
        assert_eq!(View::from_path("/humidity?range=24h"), Some(View::Humidity));
        assert_eq!(View::from_path("/login#top"), Some(View::Login));
        assert_eq!(View::from_path("/admin"), None);
    }

    #[test]
    fn test_protected_views_render_when_signed_in() {
        for view in [View::Home, View::Temperature, View::Humidity] {
            assert_eq!(
                RouteGate::check(&signed_in(), view.path()),
                GateDecision::Render(view)
            );
        }
    }

    #[test]
    fn test_protected_view_redirects_and_preserves_location() {
        let decision = RouteGate::check(&SessionState::anonymous(), "/humidity?range=24h");
        assert_eq!(
            decision,
            GateDecision::Redirect {
                to: "/login".to_string(),
                from: Some("/humidity?range=24h".to_string()),
            }
        );
    }

    #[test]
    fn test_loading_does_not_open_the_gate() {
        let mut state = SessionState::anonymous();
        state.loading = true;
        assert!(matches!(
            RouteGate::check(&state, "/temperature"),
            GateDecision::Redirect { .. }
        ));
    }

    #[test]
    fn test_login_view_is_public() {
        assert_eq!(
            RouteGate::check(&SessionState::anonymous(), "/login"),
            GateDecision::Render(View::Login)
        );
    }

    #[test]
    fn test_login_view_sends_signed_in_user_back() {
        assert_eq!(
            RouteGate::check_with_origin(&signed_in(), "/login", Some("/temperature")),
            GateDecision::Redirect {
                to: "/temperature".to_string(),
                from: None,
            }
        );
        assert_eq!(
            RouteGate::check(&signed_in(), "/login"),
            GateDecision::Redirect {
                to: "/".to_string(),
                from: None,
            }
        );
    }

    #[test]
    fn test_unknown_path_redirects_to_login() {
        for state in [SessionState::anonymous(), signed_in()] {
            assert_eq!(
                RouteGate::check(&state, "/nowhere"),
                GateDecision::Redirect {
                    to: "/login".to_string(),
                    from: None,
                }
            );
        }
    }

    #[test]
    fn test_post_login_destination() {
        assert_eq!(RouteGate::post_login_destination(None), "/");
        assert_eq!(RouteGate::post_login_destination(Some("/humidity")), "/humidity");
        assert_eq!(RouteGate::post_login_destination(Some("/login")), "/");
        assert_eq!(RouteGate::post_login_destination(Some("/elsewhere")), "/");
    }
}
