use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        // Get the current profile
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_"))
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    /// Token lifetime in seconds. Tokens are issued elsewhere; tests mint their own.
    #[cfg(test)]
    pub fn jwt_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_expiry")
            .unwrap_or(900)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017/fixly".to_string())
    }

    pub fn database_name() -> String {
        Self::figment()
            .extract_inner("database_name")
            .unwrap_or_else(|_| "fixly".to_string())
    }

    pub fn mail_host() -> String {
        Self::figment()
            .extract_inner("mail_host")
            .unwrap_or_else(|_| "smtp.gmail.com".to_string())
    }

    pub fn mail_port() -> u16 {
        Self::figment()
            .extract_inner("mail_port")
            .unwrap_or(587)
    }

    pub fn mail_user() -> String {
        Self::figment()
            .extract_inner("mail_user")
            .unwrap_or_default()
    }

    pub fn mail_password() -> String {
        Self::figment()
            .extract_inner("mail_password")
            .unwrap_or_default()
    }

    pub fn mail_from() -> String {
        Self::figment()
            .extract_inner("mail_from")
            .unwrap_or_else(|_| "Fixly <noreply@fixly.app>".to_string())
    }

    /// Lifetime of a cached browse result.
    pub fn cache_ttl_secs() -> u64 {
        Self::figment()
            .extract_inner("cache_ttl_secs")
            .unwrap_or(300)
    }

    pub fn cache_max_entries() -> usize {
        Self::figment()
            .extract_inner("cache_max_entries")
            .unwrap_or(500)
    }

    /// Requests slower than this are logged as warnings.
    pub fn slow_request_ms() -> u64 {
        Self::figment()
            .extract_inner("slow_request_ms")
            .unwrap_or(1000)
    }

    pub fn is_development() -> bool {
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());
        profile == "development"
    }

    pub fn is_mail_enabled() -> bool {
        !Self::mail_user().is_empty() && !Self::mail_password().is_empty()
    }
}
