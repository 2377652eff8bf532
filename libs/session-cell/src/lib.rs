// =====================================================================================
// SESSION CELL - AUTH COORDINATION & ROLE RESOLUTION
// =====================================================================================
//
// This cell owns the "who is signed in and with what role" state:
// - Pull-based validation cycles with mutual exclusion and per-trigger debounce
// - Push-based auth-change subscription serialized through the same gate
// - Total role resolution with a remote lookup, keyword fallback, and TTL cache
// - Loading-flag integration for the stuck-state recovery watchdog
//
// =====================================================================================

pub mod models;
pub mod services;

pub use models::{SessionPhase, SessionSnapshot, SessionStoreConfig, ValidationTrigger};
pub use services::{RoleResolver, SessionStore, SESSION_LOADING_FLAG};
