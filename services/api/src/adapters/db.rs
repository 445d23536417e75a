//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the repository ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::BTreeSet;
use training_hub_core::domain::{
    Assignment, AssignmentDetails, AssignmentStatus, Module, ModuleDraft, NewUser, Role, User,
    UserCredentials,
};
use training_hub_core::ports::{
    AssignmentRepository, AssignmentTransaction, AuthSessionStore, ModuleRepository, PortError,
    PortResult, UserRepository,
};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every repository port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Translates a `sqlx` failure into the port vocabulary.
fn map_db_error(e: sqlx::Error, entity: &str) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", entity)),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            PortError::Conflict(format!("{} already exists", entity))
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            PortError::NotFound(format!("{} references a missing record", entity))
        }
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "id, name, email, role, is_active, created_at, updated_at";
const MODULE_COLUMNS: &str =
    "id, title, description, content, instructor_id, estimated_duration_minutes, created_at, updated_at";
const ASSIGNMENT_COLUMNS: &str = "id, module_id, trainee_id, instructor_id, status, score, attempts, completed_at, created_at, updated_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        let role = Role::parse(&self.role).ok_or_else(|| {
            PortError::Unexpected(format!("Unknown role '{}' for user {}", self.role, self.id))
        })?;
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            role,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
    is_active: bool,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            hashed_password: self.hashed_password,
            is_active: self.is_active,
        }
    }
}

#[derive(FromRow)]
struct ModuleRecord {
    id: Uuid,
    title: String,
    description: String,
    content: String,
    instructor_id: Uuid,
    estimated_duration_minutes: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ModuleRecord {
    fn to_domain(self) -> Module {
        Module {
            id: self.id,
            title: self.title,
            description: self.description,
            content: self.content,
            instructor_id: self.instructor_id,
            estimated_duration_minutes: self.estimated_duration_minutes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct AssignmentRecord {
    id: Uuid,
    module_id: Uuid,
    trainee_id: Uuid,
    instructor_id: Uuid,
    status: String,
    score: Option<i32>,
    attempts: i32,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl AssignmentRecord {
    fn to_domain(self) -> PortResult<Assignment> {
        let status = AssignmentStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!(
                "Unknown status '{}' for assignment {}",
                self.status, self.id
            ))
        })?;
        Ok(Assignment {
            id: self.id,
            module_id: self.module_id,
            trainee_id: self.trainee_id,
            instructor_id: self.instructor_id,
            status,
            score: self.score,
            attempts: self.attempts,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AssignmentDetailsRecord {
    #[sqlx(flatten)]
    assignment: AssignmentRecord,
    module_title: String,
    module_description: String,
    estimated_duration_minutes: i32,
}
impl AssignmentDetailsRecord {
    fn to_domain(self) -> PortResult<AssignmentDetails> {
        Ok(AssignmentDetails {
            assignment: self.assignment.to_domain()?,
            module_title: self.module_title,
            module_description: self.module_description,
            estimated_duration_minutes: self.estimated_duration_minutes,
        })
    }
}

fn assignments_to_domain(records: Vec<AssignmentRecord>) -> PortResult<Vec<Assignment>> {
    records.into_iter().map(AssignmentRecord::to_domain).collect()
}

//=========================================================================================
// `UserRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserRepository for DbAdapter {
    async fn create_user(&self, new_user: &NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, name, email, hashed_password, role) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.hashed_password)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "User"))?;
        record.to_domain()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("User {}", user_id)))?;
        record.to_domain()
    }

    async fn get_user_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password, is_active FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "User"))?;
        Ok(record.to_domain())
    }

    async fn get_user_credentials_by_id(&self, user_id: Uuid) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password, is_active FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("User {}", user_id)))?;
        Ok(record.to_domain())
    }

    async fn list_users_by_role(&self, role: Role) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE role = $1 ORDER BY name ASC",
            USER_COLUMNS
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "User"))?;
        records.into_iter().map(UserRecord::to_domain).collect()
    }

    async fn update_user_profile(&self, user_id: Uuid, name: &str, email: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET name = $2, email = $3, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(name)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "User with this email"))?;
        record.to_domain()
    }

    async fn update_password_hash(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE users SET hashed_password = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .bind(hashed_password)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "User"))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }
}

//=========================================================================================
// `AuthSessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthSessionStore for DbAdapter {
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "Auth session"))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Auth session"))?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "Auth session"))?;
        Ok(())
    }
}

//=========================================================================================
// `ModuleRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ModuleRepository for DbAdapter {
    async fn create_module(&self, instructor_id: Uuid, draft: &ModuleDraft) -> PortResult<Module> {
        let record = sqlx::query_as::<_, ModuleRecord>(&format!(
            "INSERT INTO modules (id, title, description, content, instructor_id, estimated_duration_minutes) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            MODULE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.content)
        .bind(instructor_id)
        .bind(draft.estimated_duration_minutes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Module"))?;
        Ok(record.to_domain())
    }

    async fn get_module_by_id(&self, module_id: Uuid) -> PortResult<Module> {
        let record = sqlx::query_as::<_, ModuleRecord>(&format!(
            "SELECT {} FROM modules WHERE id = $1",
            MODULE_COLUMNS
        ))
        .bind(module_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("Module {}", module_id)))?;
        Ok(record.to_domain())
    }

    async fn list_modules(&self, instructor_id: Option<Uuid>) -> PortResult<Vec<Module>> {
        let records = sqlx::query_as::<_, ModuleRecord>(&format!(
            "SELECT {} FROM modules WHERE ($1::uuid IS NULL OR instructor_id = $1) ORDER BY created_at ASC",
            MODULE_COLUMNS
        ))
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Module"))?;
        Ok(records.into_iter().map(ModuleRecord::to_domain).collect())
    }

    async fn update_module(&self, module_id: Uuid, draft: &ModuleDraft) -> PortResult<Module> {
        let record = sqlx::query_as::<_, ModuleRecord>(&format!(
            "UPDATE modules SET title = $2, description = $3, content = $4, \
             estimated_duration_minutes = $5, updated_at = NOW() WHERE id = $1 RETURNING {}",
            MODULE_COLUMNS
        ))
        .bind(module_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.content)
        .bind(draft.estimated_duration_minutes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("Module {}", module_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_module_cascade(&self, module_id: Uuid) -> PortResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error(e, "Module"))?;

        let removed = sqlx::query("DELETE FROM assignments WHERE module_id = $1")
            .bind(module_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error(e, "Assignment"))?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(module_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error(e, "Module"))?
            .rows_affected();
        if deleted == 0 {
            // Dropping `tx` rolls the assignment delete back.
            return Err(PortError::NotFound(format!("Module {} not found", module_id)));
        }

        tx.commit().await.map_err(|e| map_db_error(e, "Module"))?;
        Ok(removed)
    }
}

//=========================================================================================
// Assignment Transaction
//=========================================================================================

/// A Postgres transaction holding the per-trainee advisory lock.
pub struct PgAssignmentTransaction {
    tx: Option<Transaction<'static, Postgres>>,
    trainee_id: Uuid,
}

impl PgAssignmentTransaction {
    fn tx(&mut self) -> PortResult<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| PortError::Unexpected("Assignment transaction already finished".to_string()))
    }
}

#[async_trait]
impl AssignmentTransaction for PgAssignmentTransaction {
    async fn current_module_ids(&mut self) -> PortResult<BTreeSet<Uuid>> {
        let trainee_id = self.trainee_id;
        let tx = self.tx()?;
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT module_id FROM assignments WHERE trainee_id = $1")
            .bind(trainee_id)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| map_db_error(e, "Assignment"))?;
        Ok(ids.into_iter().collect())
    }

    async fn remove_modules(&mut self, module_ids: &[Uuid]) -> PortResult<u64> {
        let trainee_id = self.trainee_id;
        let tx = self.tx()?;
        let result =
            sqlx::query("DELETE FROM assignments WHERE trainee_id = $1 AND module_id = ANY($2)")
                .bind(trainee_id)
                .bind(module_ids)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_db_error(e, "Assignment"))?;
        Ok(result.rows_affected())
    }

    async fn insert_assignments(&mut self, assignments: &[Assignment]) -> PortResult<u64> {
        if assignments.is_empty() {
            return Ok(0);
        }
        let tx = self.tx()?;
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "INSERT INTO assignments ({}) ",
            ASSIGNMENT_COLUMNS
        ));
        builder.push_values(assignments, |mut row, a| {
            row.push_bind(a.id)
                .push_bind(a.module_id)
                .push_bind(a.trainee_id)
                .push_bind(a.instructor_id)
                .push_bind(a.status.as_str())
                .push_bind(a.score)
                .push_bind(a.attempts)
                .push_bind(a.completed_at)
                .push_bind(a.created_at)
                .push_bind(a.updated_at);
        });
        let result = builder
            .build()
            .execute(&mut **tx)
            .await
            .map_err(|e| map_db_error(e, "Assignment"))?;
        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> PortResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| PortError::Unexpected("Assignment transaction already finished".to_string()))?;
        tx.commit().await.map_err(|e| map_db_error(e, "Assignment"))
    }
}

//=========================================================================================
// `AssignmentRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl AssignmentRepository for DbAdapter {
    async fn begin_assignment_transaction(
        &self,
        trainee_id: Uuid,
    ) -> PortResult<Box<dyn AssignmentTransaction>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error(e, "Assignment"))?;

        // Serializes reconciliations for the same trainee until commit/rollback.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(trainee_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error(e, "Assignment"))?;

        Ok(Box::new(PgAssignmentTransaction {
            tx: Some(tx),
            trainee_id,
        }))
    }

    async fn get_assignment_by_id(&self, assignment_id: Uuid) -> PortResult<Assignment> {
        let record = sqlx::query_as::<_, AssignmentRecord>(&format!(
            "SELECT {} FROM assignments WHERE id = $1",
            ASSIGNMENT_COLUMNS
        ))
        .bind(assignment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("Assignment {}", assignment_id)))?;
        record.to_domain()
    }

    async fn list_assignments_for_trainee(&self, trainee_id: Uuid) -> PortResult<Vec<Assignment>> {
        let records = sqlx::query_as::<_, AssignmentRecord>(&format!(
            "SELECT {} FROM assignments WHERE trainee_id = $1 ORDER BY created_at ASC",
            ASSIGNMENT_COLUMNS
        ))
        .bind(trainee_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Assignment"))?;
        assignments_to_domain(records)
    }

    async fn list_assignments_by_instructor(
        &self,
        instructor_id: Uuid,
    ) -> PortResult<Vec<Assignment>> {
        let records = sqlx::query_as::<_, AssignmentRecord>(&format!(
            "SELECT {} FROM assignments WHERE instructor_id = $1 ORDER BY created_at ASC",
            ASSIGNMENT_COLUMNS
        ))
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Assignment"))?;
        assignments_to_domain(records)
    }

    async fn list_assignments(&self) -> PortResult<Vec<Assignment>> {
        let records = sqlx::query_as::<_, AssignmentRecord>(&format!(
            "SELECT {} FROM assignments ORDER BY created_at ASC",
            ASSIGNMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Assignment"))?;
        assignments_to_domain(records)
    }

    async fn list_assignment_details_for_trainee(
        &self,
        trainee_id: Uuid,
    ) -> PortResult<Vec<AssignmentDetails>> {
        let records = sqlx::query_as::<_, AssignmentDetailsRecord>(
            "SELECT a.id, a.module_id, a.trainee_id, a.instructor_id, a.status, a.score, a.attempts, \
                    a.completed_at, a.created_at, a.updated_at, \
                    m.title AS module_title, m.description AS module_description, \
                    m.estimated_duration_minutes \
             FROM assignments a JOIN modules m ON m.id = a.module_id \
             WHERE a.trainee_id = $1 ORDER BY a.created_at ASC",
        )
        .bind(trainee_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Assignment"))?;
        records.into_iter().map(AssignmentDetailsRecord::to_domain).collect()
    }

    async fn complete_assignment(
        &self,
        assignment_id: Uuid,
        score: Option<i32>,
    ) -> PortResult<Assignment> {
        // The increment happens in SQL so concurrent completions each count.
        let record = sqlx::query_as::<_, AssignmentRecord>(&format!(
            "UPDATE assignments SET status = $2, score = COALESCE($3, score), \
             attempts = attempts + 1, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            ASSIGNMENT_COLUMNS
        ))
        .bind(assignment_id)
        .bind(AssignmentStatus::Completed.as_str())
        .bind(score)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("Assignment {}", assignment_id)))?;
        record.to_domain()
    }
}
