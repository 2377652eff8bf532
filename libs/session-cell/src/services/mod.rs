pub mod roles;
pub mod store;

pub use roles::RoleResolver;
pub use store::{SessionStore, SESSION_LOADING_FLAG};
