//! Credentials, bearer tokens and the request extractors that guard routes.

pub mod extract;
pub mod password;
pub mod token;

pub use extract::{AdminUser, AuthUser};
pub use token::{AuthSettings, Claims};
