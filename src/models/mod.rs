pub mod user;
pub mod job;
pub mod application;
pub mod job_lifecycle;
pub mod job_filters;

#[cfg(test)]
pub mod fixtures;

pub use user::*;
pub use job::*;
pub use application::*;
pub use job_lifecycle::*;
pub use job_filters::*;
