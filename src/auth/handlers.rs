use axum::{
    extract::{Path, Query, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use tera::Context;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ErrorBody, LoginForm, MeResponse, ProfileResponse, PublicProfile, PublicUser,
            SignupForm, UserListItem, UserListResponse, UserSearch,
        },
        extractors::{AuthUser, CurrentUser},
        repo_types::User,
        services::{
            authenticate, register, SignupOutcome, ACCOUNT_EXISTS, INVALID_CREDENTIALS,
            MISSING_FIELDS,
        },
    },
    error::AppError,
    notice::{redirect_with_notice, Flash, Notice},
    state::AppState,
    views::Page,
};

pub const ACCOUNT_CREATED: &str = "Account created! Please log in.";
pub const LOGGED_OUT: &str = "Logged out successfully";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", get(signup_form).post(signup))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/profile/:id", get(get_profile))
        .route("/api/users", get(list_users))
}

pub async fn signup_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flash: Flash,
) -> Result<Page, AppError> {
    Ok(state.views.page("signup.html", Context::new(), user.as_ref(), flash)?)
}

#[instrument(skip(state, form))]
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let account = match form.validate() {
        Ok(a) => a,
        Err(reason) => {
            warn!(reason, "signup rejected");
            return Ok(redirect_with_notice(&state.keys, "/signup", Notice::danger(reason)));
        }
    };

    match register(&state.db, &account).await? {
        SignupOutcome::Created(user) => {
            info!(user_id = user.id, username = %user.username, "user registered");
            Ok(redirect_with_notice(&state.keys, "/login", Notice::success(ACCOUNT_CREATED)))
        }
        SignupOutcome::Taken => {
            warn!(username = %account.username, "username or email already taken");
            Ok(redirect_with_notice(&state.keys, "/signup", Notice::danger(ACCOUNT_EXISTS)))
        }
    }
}

pub async fn login_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flash: Flash,
) -> Result<Page, AppError> {
    Ok(state.views.page("login.html", Context::new(), user.as_ref(), flash)?)
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let Some((email, password)) = form.credentials() else {
        warn!("login missing fields");
        return Ok(redirect_with_notice(&state.keys, "/login", Notice::danger(MISSING_FIELDS)));
    };

    let Some(user) = authenticate(&state.db, &email, &password).await? else {
        warn!("login invalid credentials");
        return Ok(redirect_with_notice(&state.keys, "/login", Notice::danger(INVALID_CREDENTIALS)));
    };

    let cookie = state.keys.start_session(&user)?;
    info!(user_id = user.id, "user logged in");
    let mut response = Redirect::to("/dashboard").into_response();
    response.headers_mut().append(SET_COOKIE, cookie);
    Ok(response)
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Response, AppError> {
    let cookie = state.keys.end_session().map_err(anyhow::Error::from)?;
    let mut response = redirect_with_notice(&state.keys, "/", Notice::info(LOGGED_OUT));
    response.headers_mut().append(SET_COOKIE, cookie);
    info!("user logged out");
    Ok(response)
}

pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        user: user.map(PublicUser::from),
    })
}

/// Read-only public view of one user's bio.
#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    match User::find_by_id(&state.db, id).await? {
        Some(user) => Ok(Json(ProfileResponse {
            profile: PublicProfile::from(user),
        })
        .into_response()),
        None => Ok((StatusCode::NOT_FOUND, Json(ErrorBody { error: "not found" })).into_response()),
    }
}

/// Username substring search; with no `q`, the newest users.
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(search): Query<UserSearch>,
) -> Result<Json<UserListResponse>, AppError> {
    let needle = search.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let users = User::search(&state.db, needle)
        .await?
        .into_iter()
        .map(|u| UserListItem {
            id: u.id,
            username: u.username,
        })
        .collect();
    Ok(Json(UserListResponse { users }))
}
