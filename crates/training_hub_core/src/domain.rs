//! crates/training_hub_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Users and Roles
//=========================================================================================

/// The three account roles known to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Instructor,
    Trainee,
    Admin,
}

impl Role {
    /// The canonical lowercase name stored in the database and sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Instructor => "instructor",
            Role::Trainee => "trainee",
            Role::Admin => "admin",
        }
    }

    /// Parses a role name, ignoring ASCII case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "instructor" => Some(Role::Instructor),
            "trainee" => Some(Role::Trainee),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Instructors and admins may author modules and issue assignments.
    pub fn can_manage_training(self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
}

/// The data needed to register a new account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
}

//=========================================================================================
// Modules
//=========================================================================================

/// A unit of training content authored by an instructor.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub content: String,
    pub instructor_id: Uuid,
    pub estimated_duration_minutes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Module {
    /// Only the authoring instructor or an admin may edit or delete a module.
    pub fn is_editable_by(&self, user_id: Uuid, role: Role) -> bool {
        role == Role::Admin || self.instructor_id == user_id
    }
}

/// The editable fields of a module, used for both creation and updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDraft {
    pub title: String,
    pub description: String,
    pub content: String,
    pub estimated_duration_minutes: i32,
}

//=========================================================================================
// Assignments
//=========================================================================================

/// Completion state of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentStatus {
    NotStarted,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::NotStarted => "NOT_STARTED",
            AssignmentStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NOT_STARTED" => Some(AssignmentStatus::NotStarted),
            "COMPLETED" => Some(AssignmentStatus::Completed),
            _ => None,
        }
    }

    pub fn is_completed(self) -> bool {
        self == AssignmentStatus::Completed
    }
}

/// Links one trainee to one module they must complete.
///
/// At most one assignment exists per `(trainee_id, module_id)` pair.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub id: Uuid,
    pub module_id: Uuid,
    pub trainee_id: Uuid,
    pub instructor_id: Uuid,
    pub status: AssignmentStatus,
    pub score: Option<i32>,
    pub attempts: i32,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// Builds a fresh, not-started assignment.
    pub fn new(module_id: Uuid, trainee_id: Uuid, instructor_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            module_id,
            trainee_id,
            instructor_id,
            status: AssignmentStatus::NotStarted,
            score: None,
            attempts: 0,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records a completion: stamps `completed_at`, counts the attempt and keeps
    /// the previous score when none is supplied.
    pub fn mark_completed(&mut self, score: Option<i32>, now: DateTime<Utc>) {
        self.status = AssignmentStatus::Completed;
        self.completed_at = Some(now);
        self.attempts += 1;
        if score.is_some() {
            self.score = score;
        }
        self.updated_at = now;
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// Whether the given user may change this assignment's status.
    pub fn is_updatable_by(&self, user_id: Uuid, role: Role) -> bool {
        match role {
            Role::Admin => true,
            Role::Instructor => self.instructor_id == user_id,
            Role::Trainee => self.trainee_id == user_id,
        }
    }
}

/// An assignment joined with the fields of its module a trainee dashboard shows.
#[derive(Debug, Clone)]
pub struct AssignmentDetails {
    pub assignment: Assignment,
    pub module_title: String,
    pub module_description: String,
    pub estimated_duration_minutes: i32,
}
