pub mod auth;
pub mod error;

pub use auth::{
    roles, AuthChangeEvent, AuthSession, Identity, JwtClaims, RoleLookupResponse, SessionUser,
    TokenGrantResponse,
};
pub use error::AppError;
