#[macro_use]
extern crate rocket;

mod config;
mod db;
mod guards;
mod models;
mod routes;
mod services;
mod utils;

use std::time::Duration;

use dotenvy::dotenv;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

use crate::config::Config;
use crate::services::{PerformanceMonitor, ResponseCache};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

#[catch(401)]
fn unauthorized() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Missing or invalid bearer token"
    })
}

#[catch(403)]
fn forbidden() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "You are not allowed to do this"
    })
}

#[catch(404)]
fn not_found() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Resource not found (check /api/v1 prefix)"
    })
}

#[catch(422)]
fn unprocessable() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Malformed request body"
    })
}

#[catch(500)]
fn internal_error() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Internal server error"
    })
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/v1/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    let profile = if Config::is_development() { "development" } else { "release" };
    info!("🚀 Fixly API starting ({} profile)", profile);
    info!("📚 Swagger UI → http://localhost:8000/api/docs");
    if !Config::is_mail_enabled() {
        warn!("SMTP credentials missing; notifications will be skipped");
    }

    let cache = ResponseCache::new(
        Duration::from_secs(Config::cache_ttl_secs()),
        Config::cache_max_entries(),
    );
    let monitor = PerformanceMonitor::new(Duration::from_millis(Config::slow_request_ms()));

    rocket::build()
        .attach(db::init())
        .attach(CORS)
        .attach(monitor.clone())
        .manage(cache)
        .manage(monitor)
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Jobs
                routes::job::post_job,
                routes::job::browse_jobs,
                routes::job::my_jobs,
                routes::job::assigned_jobs,
                routes::job::get_job,
                routes::job::update_job,
                // Applications
                routes::application::apply_to_job,
                routes::application::list_applications,
                routes::application::can_apply,
                routes::application::my_application,
                routes::application::withdraw_application,
                routes::application::accept_application,
                routes::application::reject_application,
                // Progress & completion
                routes::progress::mark_done,
                routes::progress::confirm_completion,
                routes::progress::rate_hirer,
                routes::progress::add_milestone,
                routes::progress::complete_milestone,
                routes::progress::add_work_image,
                // Comments
                routes::comment::list_comments,
                routes::comment::add_comment,
                routes::comment::add_reply,
                // Messages
                routes::message::list_messages,
                routes::message::send_message,
                routes::message::mark_messages_read,
                // Disputes
                routes::dispute::raise_dispute,
                routes::dispute::resolve_dispute,
                // Admin
                routes::admin::get_all_jobs,
                routes::admin::get_performance,
            ],
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register(
            "/",
            catchers![unauthorized, forbidden, not_found, unprocessable, internal_error],
        )
}
