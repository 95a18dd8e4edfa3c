use crate::api::{ErrorResponse, PushService};
use crate::config::ServerConfig;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, post, routes, web};
use anyhow::Context;
use common::{MixedTargetRequest, PushError, PushRequest, PushResponse};
use hikvision_isapi::{HttpTransport, PushOptions};
use log::*;
use std::sync::Arc;

mod api;
mod config;

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

#[post("/camera/config/api/push")]
async fn push_notification(
    req: web::Json<PushRequest>,
    service: web::Data<PushService>,
) -> HttpResponse {
    info!("Received notification push request ({} target entries)", req.targets.len());
    let result = hikvision_isapi::push_notification(
        Arc::clone(&service.transport),
        req.into_inner(),
        &service.options,
    )
    .await;
    respond(result)
}

#[routes]
#[post("/camera/config/api/push/mixed-target")]
#[post("/camera/mixed-target/api/push")]
#[post("/camera-arm/api/push")]
async fn push_mixed_target(
    req: web::Json<MixedTargetRequest>,
    service: web::Data<PushService>,
) -> HttpResponse {
    info!("Received mixed-target push request ({} target entries)", req.targets.len());
    let result = hikvision_isapi::push_mixed_target(
        Arc::clone(&service.transport),
        req.into_inner(),
        &service.options,
    )
    .await;
    respond(result)
}

fn respond(result: Result<PushResponse, PushError>) -> HttpResponse {
    match result {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(push_error) => {
            error!("Push aborted before contacting any camera: {push_error}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: push_error.to_string(),
            })
        }
    }
}

fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(push_notification)
        .service(push_mixed_target);
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::from_env()?;
    let transport = HttpTransport::new().context("failed to build camera HTTP client")?;
    let service = web::Data::new(PushService {
        transport: Arc::new(transport),
        options: PushOptions {
            max_concurrency: config.max_concurrency,
        },
    });
    info!(
        "Listening on {} (per-request concurrency {})",
        config.bind_addr, config.max_concurrency
    );

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(service.clone())
            .configure(configure)
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("failed to bind {}", config.bind_addr))?
    .run()
    .await?;
    Ok(())
}
