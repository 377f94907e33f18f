/// JWT Authentication Middleware
///
/// Validates the bearer access token from the Authorization header and
/// injects the caller's identity into request extensions for route handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use uuid::Uuid;

use crate::auth::{AuthError, SessionManager};
use crate::error::AppError;

/// The authenticated caller, available as `web::ReqData<AuthenticatedUser>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// JWT middleware for protecting routes
pub struct JwtMiddleware {
    sessions: SessionManager,
}

impl JwtMiddleware {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            sessions: self.sessions.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    sessions: SessionManager,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(bearer_token)
            .map(str::to_string);

        let Some(token) = token else {
            tracing::warn!(path = %req.path(), "Missing or invalid Authorization header");
            let error: Error = AppError::Auth(AuthError::Unauthorized).into();
            return Box::pin(async move { Err(error) });
        };

        match self.sessions.authorize(&token) {
            Ok(user_id) => {
                req.extensions_mut().insert(AuthenticatedUser { user_id });
                tracing::debug!(user_id = %user_id, "Access token accepted");

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => {
                let error: Error = AppError::Auth(e).into();
                Box::pin(async move { Err(error) })
            }
        }
    }
}

/// `Bearer <token>` -> `<token>`
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() && !token.contains(' ') {
        Some(token)
    } else {
        None
    }
}
