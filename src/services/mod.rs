pub mod cache;
pub mod email;
pub mod jwt;
pub mod performance;

pub use cache::ResponseCache;
pub use email::EmailService;
pub use jwt::JwtService;
pub use performance::PerformanceMonitor;
