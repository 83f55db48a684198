pub mod assignment;
pub mod driver;
pub mod metrics;
pub mod order;
pub mod route;
pub mod user;
