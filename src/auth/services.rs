use lazy_static::lazy_static;
use regex::Regex;
use sqlx::SqlitePool;
use tracing::warn;

use crate::{
    auth::{
        dto::{LoginForm, NewAccount, SignupForm},
        password::{hash_password, verify_against_dummy, verify_password},
        repo_types::{StoreError, StoreResult, User},
    },
    error::AppError,
};

pub const MISSING_FIELDS: &str = "All fields are required";
pub const INVALID_EMAIL: &str = "Invalid email";
pub const ACCOUNT_EXISTS: &str = "Username or email already exists";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl SignupForm {
    /// Trimmed, lower-cased input or the message to show the user.
    pub fn validate(self) -> Result<NewAccount, &'static str> {
        let (Some(username), Some(email), Some(password)) = (
            non_blank(self.username),
            non_blank(self.email),
            non_blank(self.password),
        ) else {
            return Err(MISSING_FIELDS);
        };
        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            return Err(INVALID_EMAIL);
        }
        Ok(NewAccount {
            username: username.trim().to_string(),
            email,
            password,
        })
    }
}

impl LoginForm {
    /// `(email, password)` when both are present.
    pub fn credentials(self) -> Option<(String, String)> {
        let email = non_blank(self.email)?;
        let password = non_blank(self.password)?;
        Some((normalize_email(&email), password))
    }
}

#[derive(Debug)]
pub enum SignupOutcome {
    Created(User),
    Taken,
}

/// Create the account unless the username or email is already in use.
///
/// The lookup only saves an argon2 run; the unique constraints decide.
pub async fn register(db: &SqlitePool, account: &NewAccount) -> Result<SignupOutcome, AppError> {
    if User::find_by_username_or_email(db, &account.username, &account.email)
        .await?
        .is_some()
    {
        return Ok(SignupOutcome::Taken);
    }

    let hash = hash_password(&account.password)?;

    match User::create(db, &account.username, &account.email, &hash).await {
        Ok(user) => Ok(SignupOutcome::Created(user)),
        Err(StoreError::Conflict) => {
            warn!(username = %account.username, "signup lost a uniqueness race");
            Ok(SignupOutcome::Taken)
        }
        Err(e) => Err(e.into()),
    }
}

/// The user owning `email` if `password` matches. Unknown emails cost the same as wrong passwords.
pub async fn authenticate(db: &SqlitePool, email: &str, password: &str) -> StoreResult<Option<User>> {
    match User::find_by_email(db, email).await? {
        Some(user) if verify_password(password, &user.password) => Ok(Some(user)),
        Some(_) => Ok(None),
        None => {
            verify_against_dummy(password);
            Ok(None)
        }
    }
}
