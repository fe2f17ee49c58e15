use axum::{extract::State, routing::get, Form, Router};
use serde::Deserialize;
use tera::Context;
use tracing::{info, instrument};

use crate::{
    auth::{
        extractors::{AuthUser, CurrentUser},
        repo_types::User,
    },
    error::AppError,
    notice::{Flash, Notice},
    state::AppState,
    views::Page,
};

pub const PROFILE_UPDATED: &str = "Profile updated!";

#[derive(Debug, Default, Deserialize)]
pub struct BioForm {
    pub bio: Option<String>,
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/dashboard", get(dashboard).post(update_bio))
}

pub async fn home(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flash: Flash,
) -> Result<Page, AppError> {
    Ok(state.views.page("index.html", Context::new(), user.as_ref(), flash)?)
}

fn dashboard_page(state: &AppState, user: &User, flash: Flash) -> Result<Page, AppError> {
    let mut ctx = Context::new();
    ctx.insert("user", user);
    ctx.insert("member_since", &user.created_at.date().to_string());
    Ok(state.views.page("dashboard.html", ctx, Some(user), flash)?)
}

pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    flash: Flash,
) -> Result<Page, AppError> {
    dashboard_page(&state, &user, flash)
}

/// Only the logged-in owner's row is touched. A missing `bio` field, or a
/// request with no form body at all, clears it.
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn update_bio(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    mut flash: Flash,
    form: Option<Form<BioForm>>,
) -> Result<Page, AppError> {
    let bio = form.and_then(|Form(f)| f.bio).unwrap_or_default();
    user.update_bio(&state.db, &bio).await?;
    info!(bio_len = bio.len(), "bio updated");
    flash.push(Notice::success(PROFILE_UPDATED));
    dashboard_page(&state, &user, flash)
}
