use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{info, warn};
use std::rc::Rc;
use std::time::Instant;

/// Requests slower than this are logged at warn level.
const SLOW_REQUEST_MS: u128 = 1_000;

/// Per-request access log: method, path, status and latency.
///
/// Query strings and headers are left out on purpose, they can carry
/// credentials and tokens.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
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
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();

        let service = self.service.clone();

        Box::pin(async move {
            let result = service.call(req).await;
            let elapsed = start_time.elapsed().as_millis();

            match &result {
                Ok(res) => {
                    let status = res.status().as_u16();
                    if elapsed >= SLOW_REQUEST_MS {
                        warn!("Slow request: {} {} - Status: {} ({}ms)", method, path, status, elapsed);
                    } else {
                        info!("Request completed: {} {} - Status: {} ({}ms)", method, path, status, elapsed);
                    }
                }
                Err(e) => {
                    let status = e.as_response_error().status_code().as_u16();
                    info!("Request rejected: {} {} - Status: {} ({}ms)", method, path, status, elapsed);
                }
            }

            result
        })
    }
}
