// src/auth.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::task::{Context, Poll};

use actix_web::{
    cookie::{time, Cookie},
    dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http, web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use chrono::{Duration, Utc};
use futures::future::{ok, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::user_management::{User, UserView};

pub const TOKEN_COOKIE: &str = "token";
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Deserialize)]
pub struct SignupInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginInfo {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserView,
    pub token: String,
}

// JWT Creation
pub fn create_jwt(user_id: &str, secret: &str, ttl_hours: i64) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(ttl_hours);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// The authenticated caller's user id, placed in request extensions by
/// [`Authentication`]. Extracting it fails with 401 unless the token is valid
/// and its subject still exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

/// Marks a request that carried a token which failed verification.
#[derive(Debug, Clone)]
struct TokenRejected;

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claimed = {
            let extensions = req.extensions();
            if let Some(user) = extensions.get::<AuthUser>() {
                Ok(user.0.clone())
            } else if extensions.get::<TokenRejected>().is_some() {
                Err(ApiError::Unauthenticated("Invalid token".into()))
            } else {
                Err(ApiError::Unauthenticated("No token".into()))
            }
        };
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let user_id = claimed?;
            let state = state.ok_or_else(|| ApiError::Internal("application state is not configured".into()))?;
            match state.store.find_user(&user_id).await? {
                Some(_) => Ok(AuthUser(user_id)),
                None => {
                    debug!("Token subject {} no longer exists", user_id);
                    Err(ApiError::Unauthenticated("User not found for token".into()))
                }
            }
        })
    }
}

/// Resolves the session token (cookie first, then `Authorization: Bearer`)
/// for every request. Public routes pass through untouched; protected
/// handlers take an [`AuthUser`].
#[derive(Debug, Clone)]
pub struct Authentication {
    secret: String,
}

impl Authentication {
    pub fn new(secret: impl Into<String>) -> Self {
        Authentication {
            secret: secret.into(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service,
            secret: self.secret.clone(),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    secret: String,
}

fn request_token(req: &ServiceRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    let header = req.headers().get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(token) = request_token(&req) {
            match validate_jwt(&token, &self.secret) {
                Ok(claims) => {
                    req.extensions_mut().insert(AuthUser(claims.sub));
                }
                Err(e) => {
                    debug!("Rejected token on {}: {}", req.path(), e);
                    req.extensions_mut().insert(TokenRejected);
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(fut)
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
    })
}

fn session_cookie(token: &str, ttl_hours: i64) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .max_age(time::Duration::hours(ttl_hours))
        .finish()
}

fn session_response(
    mut builder: actix_web::HttpResponseBuilder,
    user: &User,
    state: &AppState,
) -> ApiResult<HttpResponse> {
    let token = create_jwt(&user.id, &state.config.jwt_secret, state.config.token_ttl_hours)?;
    Ok(builder
        .cookie(session_cookie(&token, state.config.token_ttl_hours))
        .json(AuthResponse {
            user: UserView::from(user),
            token,
        }))
}

/// POST /api/auth/signup
pub async fn signup(
    data: web::Data<AppState>,
    signup_info: web::Json<SignupInfo>,
) -> ApiResult<HttpResponse> {
    let SignupInfo {
        name,
        email,
        password,
    } = signup_info.into_inner();
    let name = name.trim().to_string();
    let email = email.trim().to_lowercase();

    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::validation("name, email and password are required"));
    }
    if !email_pattern().is_match(&email) {
        return Err(ApiError::validation("Invalid email address"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if data.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let cost = data.config.bcrypt_cost;
    let password_hash = web::block(move || bcrypt::hash(password, cost)).await??;

    let user = User::new(Uuid::new_v4().to_string(), name, email, password_hash, Utc::now());
    data.store.insert_user(&user).await?;
    info!("User {} signed up", user.id);

    session_response(HttpResponse::Created(), &user, &data)
}

/// POST /api/auth/login
pub async fn login(
    data: web::Data<AppState>,
    login_info: web::Json<LoginInfo>,
) -> ApiResult<HttpResponse> {
    let LoginInfo { email, password } = login_info.into_inner();
    let email = email.trim().to_lowercase();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    let user = data
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let hash = user.password_hash.clone();
    let valid = web::block(move || bcrypt::verify(password, &hash)).await??;
    if !valid {
        return Err(ApiError::Unauthenticated("Invalid password".into()));
    }

    debug!("User {} logged in", user.id);
    session_response(HttpResponse::Ok(), &user, &data)
}

/// POST /api/auth/logout
pub async fn logout(_user: AuthUser) -> ApiResult<HttpResponse> {
    let mut removal = Cookie::build(TOKEN_COOKIE, "").path("/").finish();
    removal.make_removal();
    Ok(HttpResponse::Ok()
        .cookie(removal)
        .json(serde_json::json!({ "message": "Logged out" })))
}
