//! One-shot notices shown on the next rendered page.
//!
//! A redirect stores the notice in a signed cookie; the page that renders it
//! clears the cookie in the same response.

use std::{convert::Infallible, time::Duration};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::SET_COOKIE, request::Parts, HeaderValue},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::auth::session::{read_cookie, SessionKeys, TokenKind};

pub const NOTICE_COOKIE: &str = "bioboard_notice";
const NOTICE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Danger,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: Level::Success, message: message.into() }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self { level: Level::Danger, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { level: Level::Info, message: message.into() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NoticeClaims {
    #[serde(flatten)]
    notice: Notice,
    iat: usize,
    exp: usize,
    iss: String,
    kind: TokenKind,
}

impl SessionKeys {
    fn sign_notice(&self, notice: &Notice) -> anyhow::Result<String> {
        let (iat, exp) = Self::window(NOTICE_TTL);
        self.sign(&NoticeClaims {
            notice: notice.clone(),
            iat,
            exp,
            iss: self.issuer().to_string(),
            kind: TokenKind::Notice,
        })
    }

    fn verify_notice(&self, token: &str) -> anyhow::Result<Notice> {
        let claims: NoticeClaims = self.verify(token)?;
        if claims.kind != TokenKind::Notice {
            anyhow::bail!("not a notice token");
        }
        Ok(claims.notice)
    }

    /// `Set-Cookie` value carrying `notice` to the next page.
    pub fn notice_cookie(&self, notice: &Notice) -> anyhow::Result<HeaderValue> {
        let token = self.sign_notice(notice)?;
        Ok(self.cookie(NOTICE_COOKIE, &token, NOTICE_TTL.as_secs())?)
    }
}

/// Redirect that leaves `notice` for the target page.
pub fn redirect_with_notice(keys: &SessionKeys, to: &str, notice: Notice) -> Response {
    let mut response = Redirect::to(to).into_response();
    match keys.notice_cookie(&notice) {
        Ok(cookie) => {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        Err(e) => error!(error = %e, "notice cookie encoding failed"),
    }
    response
}

/// Notices to display on the page being rendered.
///
/// Holds whatever the previous response left in the cookie, plus anything the
/// handler pushes itself.
#[derive(Debug, Default)]
pub struct Flash {
    notices: Vec<Notice>,
    clear: Option<HeaderValue>,
}

impl Flash {
    pub fn push(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// `Set-Cookie` value that consumes the incoming notice, if one arrived.
    pub fn take_clear_cookie(&mut self) -> Option<HeaderValue> {
        self.clear.take()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Flash
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = read_cookie(&parts.headers, NOTICE_COOKIE) else {
            return Ok(Flash::default());
        };
        let keys = SessionKeys::from_ref(state);
        let clear = keys.clear_cookie(NOTICE_COOKIE).ok();
        let notices = match keys.verify_notice(&token) {
            Ok(notice) => vec![notice],
            Err(e) => {
                debug!(error = %e, "discarding unreadable notice cookie");
                Vec::new()
            }
        };
        Ok(Flash { notices, clear })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use axum::http::{header::LOCATION, Request};
    use secrecy::SecretString;

    fn keys() -> SessionKeys {
        SessionKeys::from_config(&SessionConfig {
            secret: SecretString::from("notice-secret-notice-secret-notice!".to_string()),
            issuer: "test".into(),
            ttl_minutes: 5,
            cookie_secure: false,
        })
    }

    async fn extract(keys: &SessionKeys, cookie: Option<&str>) -> Flash {
        let mut builder = Request::builder().uri("/");
        if let Some(c) = cookie {
            builder = builder.header("cookie", c);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Flash::from_request_parts(&mut parts, keys).await.unwrap()
    }

    #[test]
    fn redirect_carries_signed_notice() {
        let keys = keys();
        let response =
            redirect_with_notice(&keys, "/login", Notice::success("Account created! Please log in."));
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[LOCATION], "/login");
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("bioboard_notice="));
        assert!(!cookie.contains("Account created"));
    }

    #[tokio::test]
    async fn notice_cookie_is_read_once_and_cleared() {
        let keys = keys();
        let set = keys.notice_cookie(&Notice::danger("Invalid credentials")).unwrap();
        let pair = set.to_str().unwrap().split(';').next().unwrap().to_string();

        let mut flash = extract(&keys, Some(&pair)).await;
        assert_eq!(flash.notices(), &[Notice::danger("Invalid credentials")]);
        let clear = flash.take_clear_cookie().expect("clear cookie");
        assert!(clear.to_str().unwrap().contains("Max-Age=0"));
        assert!(flash.take_clear_cookie().is_none());
    }

    #[tokio::test]
    async fn forged_notice_is_dropped_but_still_cleared() {
        let keys = keys();
        let mut flash = extract(&keys, Some("bioboard_notice=not-a-token")).await;
        assert!(flash.notices().is_empty());
        assert!(flash.take_clear_cookie().is_some());
    }

    #[tokio::test]
    async fn session_token_is_not_a_notice() {
        let keys = keys();
        let token = keys.sign_session(1).unwrap();
        let flash = extract(&keys, Some(&format!("bioboard_notice={token}"))).await;
        assert!(flash.notices().is_empty());
    }

    #[tokio::test]
    async fn no_cookie_means_nothing_to_show() {
        let mut flash = extract(&keys(), None).await;
        assert!(flash.notices().is_empty());
        assert!(flash.take_clear_cookie().is_none());
        flash.push(Notice::info("hi"));
        assert_eq!(flash.notices().len(), 1);
    }
}
