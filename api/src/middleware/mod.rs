mod auth;
mod guards;

pub use auth::{cognito_auth_middleware, CurrentUser};
pub use guards::{AuthRejection, RequireStaff, RequireSuperuser, RequireUser};
