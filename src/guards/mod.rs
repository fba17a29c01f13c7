pub mod auth;
pub mod role;

pub use auth::{AuthGuard, Viewer};
pub use role::{AdminGuard, FixerGuard, HirerGuard};
