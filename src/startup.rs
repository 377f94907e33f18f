use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::SessionManager;
use crate::configuration::SecuritySettings;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{get_current_user, health_check, login, refresh, register};
use crate::security::LoginThrottle;

pub fn run(
    listener: TcpListener,
    sessions: SessionManager,
    security: SecuritySettings,
) -> Result<Server, std::io::Error> {
    let throttle = web::Data::new(LoginThrottle::from_settings(&security));
    let sessions_data = web::Data::new(sessions.clone());
    let security_data = web::Data::new(security);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(sessions_data.clone())
            .app_data(security_data.clone())
            .app_data(throttle.clone())

            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api")
                    // Public routes
                    .route("/auth/register", web::post().to(register))
                    .route("/auth/login", web::post().to(login))
                    .route("/auth/refresh", web::post().to(refresh))

                    // Protected routes (require a valid access token)
                    .service(
                        web::scope("/users")
                            .wrap(JwtMiddleware::new(sessions.clone()))
                            .route("/me", web::get().to(get_current_user)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
