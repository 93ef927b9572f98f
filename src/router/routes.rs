// Path -> view table and the pure routing rules

use crate::session::manager::Session;
use std::collections::HashMap;
use std::fmt;

/// Screens the client can show
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum View {
    Start,
    Login,
    Signup,
    ForgotPassword,
    ResetPassword { token: Option<String> },
    Chat,
    Survey,
    Admin,
    AdminConversation { id: u32 },
}

impl View {
    pub fn path(&self) -> String {
        match self {
            View::Start => "/".to_string(),
            View::Login => "/login".to_string(),
            View::Signup => "/signup".to_string(),
            View::ForgotPassword => "/forgot-password".to_string(),
            View::ResetPassword { token: Some(token) } => {
                let query = serde_urlencoded::to_string(&[("token", token.as_str())][..]).unwrap_or_default();
                format!("/reset-password?{}", query)
            }
            View::ResetPassword { token: None } => "/reset-password".to_string(),
            View::Chat => "/chat".to_string(),
            View::Survey => "/survey".to_string(),
            View::Admin => "/admin".to_string(),
            View::AdminConversation { id } => format!("/admin/conversations/{}", id),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            View::Start => "start",
            View::Login => "login",
            View::Signup => "signup",
            View::ForgotPassword => "forgot-password",
            View::ResetPassword { .. } => "reset-password",
            View::Chat => "chat",
            View::Survey => "survey",
            View::Admin => "admin",
            View::AdminConversation { .. } => "admin-conversation",
        };
        f.write_str(name)
    }
}

/// Who may see a route
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Access {
    /// Only without a session; authenticated users are sent to chat
    Guest,
    Member,
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Root,
    Login,
    Signup,
    ForgotPassword,
    ResetPassword,
    Chat,
    Survey,
    Admin,
    AdminConversation,
}

const ROUTES: &[(&str, Route, Access)] = &[
    ("/", Route::Root, Access::Guest),
    ("/login", Route::Login, Access::Guest),
    ("/signup", Route::Signup, Access::Guest),
    ("/forgot-password", Route::ForgotPassword, Access::Guest),
    ("/reset-password", Route::ResetPassword, Access::Guest),
    ("/chat", Route::Chat, Access::Member),
    ("/survey", Route::Survey, Access::Member),
    ("/admin", Route::Admin, Access::Admin),
];

const ADMIN_CONVERSATION_PREFIX: &str = "/admin/conversations/";

/// What the router needs to know about the session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuthState {
    pub authenticated: bool,
    pub is_admin: bool,
}

impl AuthState {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn member() -> Self {
        Self {
            authenticated: true,
            is_admin: false,
        }
    }

    pub fn admin() -> Self {
        Self {
            authenticated: true,
            is_admin: true,
        }
    }
}

impl From<&Session> for AuthState {
    fn from(session: &Session) -> Self {
        Self {
            authenticated: session.is_authenticated(),
            is_admin: session.is_admin(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub view: View,
    /// Location to show in history; differs from the input on redirect
    pub path: String,
    pub redirected: bool,
}

struct Location<'a> {
    path: &'a str,
    query: HashMap<String, String>,
}

fn parse_location(location: &str) -> Location<'_> {
    let (path, query) = match location.split_once('?') {
        Some((path, query)) => (path, query),
        None => (location, ""),
    };

    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    let query = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default();

    Location { path, query }
}

fn match_route(path: &str) -> Option<(Route, Access, Option<u32>)> {
    if let Some((_, route, access)) = ROUTES.iter().find(|(p, _, _)| *p == path) {
        return Some((*route, *access, None));
    }

    path.strip_prefix(ADMIN_CONVERSATION_PREFIX)
        .and_then(|rest| rest.parse::<u32>().ok())
        .map(|id| (Route::AdminConversation, Access::Admin, Some(id)))
}

/// Map a location plus session and quota state to a view.
///
/// Pure: replaying the same inputs (browser back/forward) yields the same
/// result regardless of what was shown before.
pub fn resolve(location: &str, auth: AuthState, survey_unlocked: bool) -> Resolution {
    let parsed = parse_location(location);
    let matched = match_route(parsed.path);

    let view = if !auth.authenticated {
        match matched {
            Some((Route::Root, _, _)) => View::Start,
            Some((Route::Login, _, _)) => View::Login,
            Some((Route::Signup, _, _)) => View::Signup,
            Some((Route::ForgotPassword, _, _)) => View::ForgotPassword,
            Some((Route::ResetPassword, _, _)) => View::ResetPassword {
                token: parsed.query.get("token").cloned(),
            },
            _ => View::Start,
        }
    } else {
        let member_home = if survey_unlocked { View::Survey } else { View::Chat };
        match matched {
            Some((Route::Admin, Access::Admin, _)) if auth.is_admin => View::Admin,
            Some((Route::AdminConversation, Access::Admin, Some(id))) if auth.is_admin => {
                View::AdminConversation { id }
            }
            _ => member_home,
        }
    };

    let redirected = match (&view, matched) {
        (View::Start, Some((Route::Root, _, _))) => false,
        (View::Login, _) | (View::Signup, _) | (View::ForgotPassword, _) => false,
        (View::ResetPassword { .. }, _) => false,
        (View::Chat, Some((Route::Chat, _, _))) => false,
        (View::Survey, Some((Route::Survey, _, _))) => false,
        (View::Admin, _) | (View::AdminConversation { .. }, _) => false,
        _ => true,
    };

    let path = if redirected {
        view.path()
    } else {
        location.to_string()
    };

    Resolution {
        view,
        path,
        redirected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_routes() {
        let cases = [
            ("/", View::Start),
            ("/login", View::Login),
            ("/signup/", View::Signup),
            ("/forgot-password", View::ForgotPassword),
            ("/reset-password", View::ResetPassword { token: None }),
        ];
        for (path, expected) in cases {
            let resolution = resolve(path, AuthState::anonymous(), false);
            assert_eq!(resolution.view, expected, "path {}", path);
            assert!(!resolution.redirected, "path {}", path);
        }
    }

    #[test]
    fn test_reset_token_from_query() {
        let resolution = resolve("/reset-password?token=abc%2B1", AuthState::anonymous(), false);
        assert_eq!(
            resolution.view,
            View::ResetPassword {
                token: Some("abc+1".to_string())
            }
        );
        assert_eq!(resolution.path, "/reset-password?token=abc%2B1");
    }

    #[test]
    fn test_guest_on_private_paths_lands_on_start() {
        for path in ["/admin", "/admin/conversations/3", "/chat", "/survey", "/nowhere"] {
            let resolution = resolve(path, AuthState::anonymous(), false);
            assert_eq!(resolution.view, View::Start, "path {}", path);
            assert!(resolution.redirected);
            assert_eq!(resolution.path, "/");
        }
    }

    #[test]
    fn test_member_on_guest_paths_goes_to_chat() {
        for path in ["/", "/login", "/signup", "/forgot-password", "/reset-password"] {
            let resolution = resolve(path, AuthState::member(), false);
            assert_eq!(resolution.view, View::Chat, "path {}", path);
            assert_eq!(resolution.path, "/chat");
        }
    }

    #[test]
    fn test_member_cannot_open_admin() {
        let resolution = resolve("/admin", AuthState::member(), false);
        assert_eq!(resolution.view, View::Chat);
        assert!(resolution.redirected);

        let resolution = resolve("/admin/conversations/4", AuthState::member(), false);
        assert_eq!(resolution.view, View::Chat);
    }

    #[test]
    fn test_admin_routes() {
        let resolution = resolve("/admin", AuthState::admin(), false);
        assert_eq!(resolution.view, View::Admin);
        assert!(!resolution.redirected);

        let resolution = resolve("/admin/conversations/42", AuthState::admin(), false);
        assert_eq!(resolution.view, View::AdminConversation { id: 42 });

        let resolution = resolve("/admin/conversations/abc", AuthState::admin(), false);
        assert_eq!(resolution.view, View::Chat);
    }

    #[test]
    fn test_survey_forced_when_complete() {
        for path in ["/", "/chat", "/login", "/survey"] {
            let resolution = resolve(path, AuthState::member(), true);
            assert_eq!(resolution.view, View::Survey, "path {}", path);
        }
        assert!(!resolve("/survey", AuthState::member(), true).redirected);
    }

    #[test]
    fn test_survey_unreachable_before_complete() {
        let resolution = resolve("/survey", AuthState::member(), false);
        assert_eq!(resolution.view, View::Chat);
        assert!(resolution.redirected);
    }

    #[test]
    fn test_resolution_is_replayable() {
        let auth = AuthState::member();
        let first = resolve("/admin", auth, false);
        let _ = resolve("/chat", auth, true);
        assert_eq!(resolve("/admin", auth, false), first);
    }

    #[test]
    fn test_view_paths() {
        assert_eq!(View::AdminConversation { id: 7 }.path(), "/admin/conversations/7");
        assert_eq!(
            View::ResetPassword {
                token: Some("a b".to_string())
            }
            .path(),
            "/reset-password?token=a+b"
        );
        assert_eq!(View::Survey.to_string(), "survey");
    }
}
