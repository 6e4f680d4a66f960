//! Route protection rules shared by the server guard and client navigation.

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_BASE_PATH, Redirects};
use crate::match_user::UserMatch;
use crate::types::AuthUser;

/// Access requirement attached to a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteAuth {
    /// Anyone may visit.
    #[default]
    Public,
    /// A signed-in user is required.
    User,
    /// Only visitors without a session (login, sign-up pages).
    Guest,
    /// A signed-in user whose fields satisfy `user` is required.
    Match {
        user: UserMatch,
        /// Page redirect for users that fail the predicate.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        redirect: Option<String>,
    },
}

/// Whether a route serves pages or an API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Page,
    Api,
}

impl RouteKind {
    /// Paths under `/api/` are APIs, everything else is a page. A query
    /// string or fragment is ignored.
    pub fn for_path(path: &str) -> Self {
        let path = strip_query(path);
        if path == "/api" || path.starts_with("/api/") {
            Self::Api
        } else {
            Self::Page
        }
    }
}

/// Outcome of evaluating a route rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// Send the visitor elsewhere (pages).
    Redirect(String),
    /// Reject with this status (APIs).
    Deny(u16),
}

/// One pattern and its requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRule {
    pub pattern: String,
    pub auth: RouteAuth,
}

/// Ordered rule list. The first matching pattern wins.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRules {
    rules: Vec<RouteRule>,
    auth_base_path: String,
}

impl Default for RouteRules {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            auth_base_path: DEFAULT_BASE_PATH.to_string(),
        }
    }
}

static PUBLIC: RouteAuth = RouteAuth::Public;

impl RouteRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths under the auth mount point are always public.
    pub fn auth_base_path(mut self, path: impl Into<String>) -> Self {
        self.auth_base_path = path.into();
        self
    }

    pub fn rule(mut self, pattern: impl Into<String>, auth: RouteAuth) -> Self {
        self.rules.push(RouteRule {
            pattern: pattern.into(),
            auth,
        });
        self
    }

    /// Requirement for `path`. Unmatched paths are public.
    pub fn resolve(&self, path: &str) -> &RouteAuth {
        if path_matches(&format!("{}/**", self.auth_base_path), path) {
            return &PUBLIC;
        }

        self.rules
            .iter()
            .find(|rule| path_matches(&rule.pattern, path))
            .map(|rule| &rule.auth)
            .unwrap_or(&PUBLIC)
    }

    /// Resolve and evaluate in one step.
    pub fn check(
        &self,
        path: &str,
        user: Option<&AuthUser>,
        redirects: &Redirects,
    ) -> AccessDecision {
        evaluate(self.resolve(path), user, path, RouteKind::for_path(path), redirects)
    }
}

/// Decide whether a visitor may access `path`.
///
/// Pages redirect, APIs answer with 401 (no user) or 403 (predicate failed).
pub fn evaluate(
    auth: &RouteAuth,
    user: Option<&AuthUser>,
    path: &str,
    kind: RouteKind,
    redirects: &Redirects,
) -> AccessDecision {
    match (auth, user, kind) {
        (RouteAuth::Public, _, _) => AccessDecision::Allow,

        (RouteAuth::Guest, Some(_), RouteKind::Page) => {
            AccessDecision::Redirect(redirects.guest.clone())
        }
        (RouteAuth::Guest, _, _) => AccessDecision::Allow,

        (RouteAuth::User | RouteAuth::Match { .. }, None, RouteKind::Page) => {
            AccessDecision::Redirect(login_redirect(&redirects.login, path))
        }
        (RouteAuth::User | RouteAuth::Match { .. }, None, RouteKind::Api) => {
            AccessDecision::Deny(401)
        }

        (RouteAuth::User, Some(_), _) => AccessDecision::Allow,

        (RouteAuth::Match { user: predicate, redirect }, Some(user), kind) => {
            if predicate.matches(user) {
                AccessDecision::Allow
            } else if kind == RouteKind::Api {
                AccessDecision::Deny(403)
            } else {
                AccessDecision::Redirect(
                    redirect.clone().unwrap_or_else(|| redirects.guest.clone()),
                )
            }
        }
    }
}

/// `login?redirect=<path>`, so the login page can send the visitor back.
fn login_redirect(login: &str, path: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
    let separator = if login.contains('?') { '&' } else { '?' };
    format!("{login}{separator}redirect={encoded}")
}

/// Match a request path against a route pattern.
///
/// Supports exact paths, `*` for exactly one path segment, and a trailing
/// `/**` for the prefix itself plus any suffix.
pub fn path_matches(pattern: &str, path: &str) -> bool {
    let path = strip_query(path);

    if let Some(prefix) = pattern.strip_suffix("/**") {
        return prefix_segments_match(prefix, path);
    }

    segments_match(pattern, path)
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn segment_matches(pattern: &str, segment: &str) -> bool {
    pattern == "*" || pattern == segment
}

fn segments_match(pattern: &str, path: &str) -> bool {
    let pattern = split_segments(pattern);
    let path = split_segments(path);
    pattern.len() == path.len()
        && pattern
            .iter()
            .zip(&path)
            .all(|(p, s)| segment_matches(p, s))
}

fn prefix_segments_match(prefix: &str, path: &str) -> bool {
    let prefix = split_segments(prefix);
    let path = split_segments(path);
    prefix.len() <= path.len()
        && prefix
            .iter()
            .zip(&path)
            .all(|(p, s)| segment_matches(p, s))
}
