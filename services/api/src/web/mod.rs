pub mod analytics;
pub mod assignments;
pub mod auth;
pub mod extract;
pub mod middleware;
pub mod modules;
pub mod password;
pub mod rest;
pub mod state;
pub mod users;

// Re-export the pieces the binary needs to build the router.
pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::{AppState, CurrentUser};
