use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::dto::{AuthResponse, LoginRequest, SignupRequest};
use super::repo_types::{DuplicateEmail, NewUser, User};
use crate::{
    auth::{
        password::{hash_password, verify_password},
        JwtKeys,
    },
    error::AppError,
    state::AppState,
};

#[instrument(skip(st))]
pub async fn list_users(st: &AppState) -> Result<Vec<User>, AppError> {
    st.store.list_users().await.map_err(|e| {
        error!(error = %e, "list_users failed");
        AppError::Storage("Fetching users failed, please try again later.".into())
    })
}

#[instrument(skip(st, payload))]
pub async fn signup(st: &AppState, mut payload: SignupRequest) -> Result<AuthResponse, AppError> {
    payload.validate()?;

    let signup_failed = || AppError::Storage("Signing up failed, please try again later.".into());

    let user_exists = || AppError::Validation("User exists already, please login instead.".into());

    match st.store.find_user_by_email(&payload.email).await {
        Ok(None) => {}
        Ok(Some(_)) => {
            warn!(email = %payload.email, "email already registered");
            return Err(user_exists());
        }
        Err(e) => {
            error!(error = %e, "find_user_by_email failed");
            return Err(signup_failed());
        }
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        signup_failed()
    })?;

    let email = payload.email.clone();
    let user = st
        .store
        .create_user(NewUser {
            name: payload.name,
            email: payload.email,
            password_hash,
        })
        .await
        .map_err(|e| {
            if e.is::<DuplicateEmail>() {
                warn!(email = %email, "email registered concurrently");
                return user_exists();
            }
            error!(error = %e, "create user failed");
            signup_failed()
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue_tokens(st, user.id, user.email)
}

#[instrument(skip(st, payload))]
pub async fn login(st: &AppState, payload: LoginRequest) -> Result<AuthResponse, AppError> {
    let email = payload.email.trim().to_lowercase();
    let invalid = || AppError::Authentication("Invalid credentials, could not log you in.".into());

    let user = match st.store.find_user_by_email(&email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%email, "login unknown email");
            return Err(invalid());
        }
        Err(e) => {
            error!(error = %e, "find_user_by_email failed");
            return Err(AppError::Storage(
                "Logging in failed, please try again later.".into(),
            ));
        }
    };

    // unparsable stored hash counts as a mismatch
    let ok = verify_password(&payload.password, &user.password_hash).unwrap_or(false);
    if !ok {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    info!(user_id = %user.id, "user logged in");
    issue_tokens(st, user.id, user.email)
}

#[instrument(skip(st, refresh_token))]
pub async fn refresh(st: &AppState, refresh_token: &str) -> Result<AuthResponse, AppError> {
    let keys = JwtKeys::from(&st.config.jwt);
    let claims = keys.verify_refresh(refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Authentication("Invalid or expired token.".into())
    })?;

    let user = st
        .store
        .find_user(claims.sub)
        .await
        .map_err(|e| {
            error!(error = %e, "find_user failed");
            AppError::Storage("Refreshing token failed, please try again later.".into())
        })?
        .ok_or_else(|| AppError::Authentication("User not found.".into()))?;

    issue_tokens(st, user.id, user.email)
}

fn issue_tokens(st: &AppState, user_id: Uuid, email: String) -> Result<AuthResponse, AppError> {
    let keys = JwtKeys::from(&st.config.jwt);
    let sign_failed = |e: anyhow::Error| {
        error!(error = %e, %user_id, "jwt sign failed");
        AppError::Storage("Could not issue a token, please try again later.".into())
    };
    Ok(AuthResponse {
        user_id,
        email,
        token: keys.sign_access(user_id).map_err(sign_failed)?,
        refresh_token: keys.sign_refresh(user_id).map_err(sign_failed)?,
    })
}
