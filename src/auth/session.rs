use std::time::Duration;

use axum::{
    extract::FromRef,
    http::{
        header::{InvalidHeaderValue, COOKIE},
        HeaderMap, HeaderValue,
    },
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::repo_types::User,
    config::{SessionConfig, MAX_TTL_MINUTES},
    state::AppState,
};

pub const SESSION_COOKIE: &str = "bioboard_session";

/// Signed tokens share one key; `kind` keeps a notice from passing as a session.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Session,
    Notice,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub kind: TokenKind,
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
    cookie_secure: bool,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl SessionKeys {
    pub fn from_config(cfg: &SessionConfig) -> Self {
        let secret = cfg.secret.expose_secret().as_bytes();
        let minutes = cfg.ttl_minutes.clamp(0, MAX_TTL_MINUTES) as u64;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: cfg.issuer.clone(),
            ttl: Duration::from_secs(minutes * 60),
            cookie_secure: cfg.cookie_secure,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// (iat, exp) as unix timestamps for a token living `ttl`.
    pub(crate) fn window(ttl: Duration) -> (usize, usize) {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        (now.unix_timestamp() as usize, exp.unix_timestamp() as usize)
    }

    pub(crate) fn sign<T: Serialize>(&self, claims: &T) -> anyhow::Result<String> {
        Ok(encode(&Header::default(), claims, &self.encoding)?)
    }

    /// Checks signature, expiry and issuer.
    pub(crate) fn verify<T: DeserializeOwned>(&self, token: &str) -> anyhow::Result<T> {
        let mut validation = Validation::default();
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<T>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    pub fn sign_session(&self, user_id: i64) -> anyhow::Result<String> {
        let (iat, exp) = Self::window(self.ttl);
        let claims = Claims {
            sub: user_id,
            iat,
            exp,
            iss: self.issuer.clone(),
            kind: TokenKind::Session,
        };
        let token = self.sign(&claims)?;
        debug!(user_id, "session token signed");
        Ok(token)
    }

    pub fn verify_session(&self, token: &str) -> anyhow::Result<Claims> {
        let claims: Claims = self.verify(token)?;
        if claims.kind != TokenKind::Session {
            anyhow::bail!("not a session token");
        }
        Ok(claims)
    }

    /// `Set-Cookie` value binding the client to `user`.
    pub fn start_session(&self, user: &User) -> anyhow::Result<HeaderValue> {
        let token = self.sign_session(user.id)?;
        Ok(self.cookie(SESSION_COOKIE, &token, self.ttl.as_secs())?)
    }

    /// `Set-Cookie` value that drops the session cookie.
    pub fn end_session(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        self.clear_cookie(SESSION_COOKIE)
    }

    /// Session token carried by the request, if any.
    pub fn session_token(headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, SESSION_COOKIE)
    }

    pub(crate) fn cookie(
        &self,
        name: &str,
        value: &str,
        max_age: u64,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    pub(crate) fn clear_cookie(&self, name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.cookie(name, "", 0)
    }
}

pub(crate) fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, val)| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
