//! crates/training_hub_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases.

use crate::domain::{
    Assignment, AssignmentDetails, Module, ModuleDraft, NewUser, Role, User, UserCredentials,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The underlying store failed (connectivity, unclassified constraint, ...).
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, new_user: &NewUser) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user_credentials_by_id(&self, user_id: Uuid) -> PortResult<UserCredentials>;

    async fn list_users_by_role(&self, role: Role) -> PortResult<Vec<User>>;

    /// Fails with `Conflict` when another user already owns `email`.
    async fn update_user_profile(&self, user_id: Uuid, name: &str, email: &str) -> PortResult<User>;

    async fn update_password_hash(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()>;
}

#[async_trait]
pub trait AuthSessionStore: Send + Sync {
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owning user id of an unexpired session.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait ModuleRepository: Send + Sync {
    async fn create_module(&self, instructor_id: Uuid, draft: &ModuleDraft) -> PortResult<Module>;

    async fn get_module_by_id(&self, module_id: Uuid) -> PortResult<Module>;

    /// Lists every module, or only those authored by `instructor_id`.
    async fn list_modules(&self, instructor_id: Option<Uuid>) -> PortResult<Vec<Module>>;

    async fn update_module(&self, module_id: Uuid, draft: &ModuleDraft) -> PortResult<Module>;

    /// Deletes the module and every assignment referencing it as one unit.
    /// Returns the number of assignments removed.
    async fn delete_module_cascade(&self, module_id: Uuid) -> PortResult<u64>;
}

/// A unit of work over one trainee's assignments.
///
/// Implementations must serialize concurrent units for the same trainee and
/// discard every write when dropped without `commit`.
#[async_trait]
pub trait AssignmentTransaction: Send {
    async fn current_module_ids(&mut self) -> PortResult<BTreeSet<Uuid>>;

    /// Deletes the trainee's assignments for the given modules in one batch.
    async fn remove_modules(&mut self, module_ids: &[Uuid]) -> PortResult<u64>;

    /// Inserts all assignments in one batch.
    async fn insert_assignments(&mut self, assignments: &[Assignment]) -> PortResult<u64>;

    async fn commit(&mut self) -> PortResult<()>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn begin_assignment_transaction(
        &self,
        trainee_id: Uuid,
    ) -> PortResult<Box<dyn AssignmentTransaction>>;

    async fn get_assignment_by_id(&self, assignment_id: Uuid) -> PortResult<Assignment>;

    async fn list_assignments_for_trainee(&self, trainee_id: Uuid) -> PortResult<Vec<Assignment>>;

    async fn list_assignments_by_instructor(
        &self,
        instructor_id: Uuid,
    ) -> PortResult<Vec<Assignment>>;

    async fn list_assignments(&self) -> PortResult<Vec<Assignment>>;

    async fn list_assignment_details_for_trainee(
        &self,
        trainee_id: Uuid,
    ) -> PortResult<Vec<AssignmentDetails>>;

    /// Marks the assignment completed as one atomic write: counts the attempt,
    /// stamps `completed_at` and replaces the score only when one is given.
    /// Returns the updated record.
    async fn complete_assignment(
        &self,
        assignment_id: Uuid,
        score: Option<i32>,
    ) -> PortResult<Assignment>;
}

/// Everything the web layer needs from persistent storage.
pub trait DatabaseService:
    UserRepository + AuthSessionStore + ModuleRepository + AssignmentRepository
{
}

impl<T> DatabaseService for T where
    T: UserRepository + AuthSessionStore + ModuleRepository + AssignmentRepository
{
}
