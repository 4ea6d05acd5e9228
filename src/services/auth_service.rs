use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{Claims, ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Role, User},
    response::{ApiResponse, Meta},
    state::AppState,
};

const RESET_NEUTRAL_MESSAGE: &str =
    "If the phone number is registered, the reset request was sent for approval";

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let surname = required("surname", &payload.surname)?;
    let street = required("street", &payload.street)?;
    let phone = required("phone", &payload.phone)?;
    if payload.password.is_empty() {
        return Err(AppError::BadRequest("password is required".into()));
    }

    let exists = Users::find()
        .filter(UserCol::Phone.eq(phone.as_str()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict("Phone number is already registered".into()));
    }

    // A concurrent registration with the same phone still ends in Conflict
    // through the unique index.
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        surname: Set(surname),
        street: Set(street),
        phone: Set(phone),
        password_hash: Set(hash_password(&payload.password)?),
        role: Set(Role::Customer.as_str().to_string()),
        is_approved: Set(false),
        approved_at: Set(None),
        reset_hash: Set(None),
        reset_requested_at: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(user_id = %user.id, "user registered, awaiting approval");
    audit::record(
        &state.orm,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Registered, waiting for administrator approval",
        User::from(user),
        None,
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { phone, password } = payload;
    let user = Users::find()
        .filter(UserCol::Phone.eq(phone.trim()))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid phone or password".into()))?;

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::BadRequest("Invalid phone or password".into()));
    }

    let user = User::from(user);
    if user.role != Role::Admin && !user.is_approved {
        return Err(AppError::Forbidden);
    }

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(state.config.token_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.as_str().to_string(),
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse { token, user },
        Some(Meta::empty()),
    ))
}

pub async fn current_user(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let account = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", User::from(account), None))
}

/// Park a hashed replacement password until an administrator approves it.
/// The answer is the same whether or not the phone is registered.
pub async fn request_password_reset(
    state: &AppState,
    payload: ForgotPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let phone = required("phone", &payload.phone)?;
    if payload.new_password.is_empty() {
        return Err(AppError::BadRequest("new_password is required".into()));
    }
    if payload.new_password != payload.confirm {
        return Err(AppError::BadRequest("Passwords do not match".into()));
    }

    let account = Users::find()
        .filter(UserCol::Phone.eq(phone.as_str()))
        .one(&state.orm)
        .await?;

    if let Some(account) = account {
        let user_id = account.id;
        let mut active: UserActive = account.into();
        active.reset_hash = Set(Some(hash_password(&payload.new_password)?));
        active.reset_requested_at = Set(Some(Utc::now().into()));
        active.update(&state.orm).await?;

        tracing::info!(%user_id, "password reset requested");
        audit::record(
            &state.orm,
            Some(user_id),
            "password_reset_request",
            "users",
            serde_json::json!({ "user_id": user_id }),
        )
        .await;
    } else {
        tracing::debug!("password reset requested for unknown phone");
    }

    Ok(ApiResponse::message_only(RESET_NEUTRAL_MESSAGE))
}

pub async fn approve_password_reset(
    state: &AppState,
    admin: &AuthUser,
    user_id: Uuid,
) -> AppResult<ApiResponse<User>> {
    resolve_password_reset(state, admin, user_id, true).await
}

pub async fn reject_password_reset(
    state: &AppState,
    admin: &AuthUser,
    user_id: Uuid,
) -> AppResult<ApiResponse<User>> {
    resolve_password_reset(state, admin, user_id, false).await
}

async fn resolve_password_reset(
    state: &AppState,
    admin: &AuthUser,
    user_id: Uuid,
    approve: bool,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(admin)?;
    let account = Users::find_by_id(user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let Some(pending) = account.reset_hash.clone() else {
        return Err(AppError::NotFound);
    };

    let mut active: UserActive = account.into();
    if approve {
        active.password_hash = Set(pending);
    }
    active.reset_hash = Set(None);
    active.reset_requested_at = Set(None);
    let account = active.update(&state.orm).await?;

    let action = if approve {
        "password_reset_approve"
    } else {
        "password_reset_reject"
    };
    tracing::info!(%user_id, action, "password reset resolved");
    audit::record(
        &state.orm,
        Some(admin.user_id),
        action,
        "users",
        serde_json::json!({ "user_id": user_id }),
    )
    .await;

    let message = if approve {
        "Password reset approved"
    } else {
        "Password reset rejected"
    };
    Ok(ApiResponse::success(message, User::from(account), Some(Meta::empty())))
}
