/// Authentication Routes
///
/// Registration, login, token refresh, and the current user's profile.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, validate_password_policy, SessionManager, TokenPair};
use crate::configuration::SecuritySettings;
use crate::error::{AppError, DatabaseError};
use crate::identity::Identity;
use crate::middleware::AuthenticatedUser;
use crate::security::LoginThrottle;
use crate::validators::is_valid_username;

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair wrapped the way existing clients expect
#[derive(Serialize)]
pub struct AuthResponse {
    pub data: TokenPair,
}

/// POST /api/auth/register
///
/// Create a user from a username and password.
///
/// # Errors
/// - 400: Invalid username or password policy violation
/// - 409: Username already taken
/// - 500: Hashing or store failure
pub async fn register(
    form: web::Json<RegisterRequest>,
    sessions: web::Data<SessionManager>,
    security: web::Data<SecuritySettings>,
) -> Result<HttpResponse, AppError> {
    let RegisterRequest { username, password } = form.into_inner();

    let username = is_valid_username(&username)?;
    validate_password_policy(&password)?;

    let cost = security.hash_cost;
    let password_hash = web::block(move || hash_password(&password, cost)).await??;

    let identity: Identity = sessions.store().insert(&username, &password_hash).await?;

    tracing::info!(user_id = %identity.id, "User registered successfully");

    Ok(HttpResponse::Created().json(identity))
}

/// POST /api/auth/login
///
/// Exchange a username and password for an access/refresh token pair.
///
/// # Errors
/// - 401: Invalid credentials (unknown user and wrong password look the same)
/// - 429: Too many attempts from this peer address
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
    throttle: web::Data<LoginThrottle>,
) -> Result<HttpResponse, AppError> {
    // Forwarding headers are client-controlled; only the socket peer counts
    let client = req
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    throttle.check(&client)?;

    let pair = sessions.login(&form.username, &form.password).await?;

    Ok(HttpResponse::Ok().json(AuthResponse { data: pair }))
}

/// POST /api/auth/refresh
///
/// Exchange a valid refresh token for a brand-new pair. The submitted
/// refresh token is not revoked.
///
/// # Errors
/// - 401: Invalid or expired refresh token, or the user no longer exists
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let pair = sessions.refresh(&form.refresh_token).await?;

    Ok(HttpResponse::Ok().json(AuthResponse { data: pair }))
}

/// GET /api/users/me
///
/// **Requires valid JWT access token** in the Authorization header.
///
/// # Errors
/// - 401: Missing or invalid token (handled by middleware)
/// - 404: User deleted after the token was issued
pub async fn get_current_user(
    user: web::ReqData<AuthenticatedUser>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let identity = sessions
        .store()
        .find_by_id(user.user_id)
        .await?
        .ok_or_else(|| AppError::Database(DatabaseError::NotFound("User not found".to_string())))?;

    Ok(HttpResponse::Ok().json(identity))
}
