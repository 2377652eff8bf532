pub mod auth;
pub mod supabase;

pub use auth::{AuthBackend, SupabaseAuth};
pub use supabase::SupabaseClient;
