//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the authenticated caller.

use crate::config::Config;
use crate::error::ApiError;
use std::sync::Arc;
use training_hub_core::domain::Role;
use training_hub_core::ports::DatabaseService;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
}

//=========================================================================================
// CurrentUser (Specific to One Request)
//=========================================================================================

/// The authenticated caller, inserted into request extensions by `require_auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl CurrentUser {
    /// Instructors and admins only.
    pub fn require_manager(&self) -> Result<(), ApiError> {
        if self.role.can_manage_training() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Only instructors and admins may do this"))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// An instructor acting on behalf of `instructor_id` must be that instructor.
    pub fn require_acting_as(&self, instructor_id: Uuid) -> Result<(), ApiError> {
        self.require_manager()?;
        if self.is_admin() || self.user_id == instructor_id {
            Ok(())
        } else {
            Err(ApiError::forbidden("Instructors may only act on their own behalf"))
        }
    }
}
