//! Test utilities for the api crate.
//!
//! `FixtureDatabase` implements every storage port in memory so handlers can
//! be exercised without Postgres. It is only compiled when running tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use training_hub_core::domain::{
    Assignment, AssignmentDetails, Module, ModuleDraft, NewUser, Role, User, UserCredentials,
};
use training_hub_core::ports::{
    AssignmentRepository, AssignmentTransaction, AuthSessionStore, ModuleRepository, PortError,
    PortResult, UserRepository,
};
use uuid::Uuid;

use crate::config::Config;
use crate::web::state::{AppState, CurrentUser};

#[derive(Default)]
struct Tables {
    users: Vec<(User, String)>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    modules: Vec<Module>,
    assignments: Vec<Assignment>,
}

/// An in-memory stand-in for the Postgres adapter.
#[derive(Clone, Default)]
pub struct FixtureDatabase {
    tables: Arc<Mutex<Tables>>,
    session_store_down: bool,
}

impl FixtureDatabase {
    /// Every session lookup fails as if the database were unreachable.
    pub fn with_session_store_down(mut self) -> Self {
        self.session_store_down = true;
        self
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("fixture tables lock")
    }

    pub fn add_user(&self, name: &str, role: Role) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.tables()
            .users
            .push((user.clone(), "unused-hash".to_string()));
        user
    }

    pub fn add_module(&self, title: &str, instructor_id: Uuid) -> Module {
        let now = Utc::now();
        let module = Module {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: format!("{} overview", title),
            content: format!("{} content", title),
            instructor_id,
            estimated_duration_minutes: 60,
            created_at: now,
            updated_at: now,
        };
        self.tables().modules.push(module.clone());
        module
    }

    pub fn add_assignment(&self, module_id: Uuid, trainee_id: Uuid, instructor_id: Uuid) -> Assignment {
        let assignment = Assignment::new(module_id, trainee_id, instructor_id, Utc::now());
        self.tables().assignments.push(assignment.clone());
        assignment
    }

    pub fn open_session(&self, user_id: Uuid) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.tables()
            .sessions
            .insert(session_id.clone(), (user_id, Utc::now() + Duration::days(1)));
        session_id
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.tables().assignments.clone()
    }

    pub fn module_ids(&self) -> BTreeSet<Uuid> {
        self.tables().modules.iter().map(|m| m.id).collect()
    }
}

/// Shared state over `db` with a minimal configuration.
pub fn fixture_state(db: FixtureDatabase) -> Arc<AppState> {
    let config = Config::from_lookup(|key| {
        (key == "DATABASE_URL").then(|| "postgres://localhost/training_test".to_string())
    })
    .expect("fixture config");
    Arc::new(AppState {
        db: Arc::new(db),
        config: Arc::new(config),
    })
}

pub fn caller(user: &User) -> CurrentUser {
    CurrentUser {
        user_id: user.id,
        role: user.role,
    }
}

fn not_found(entity: &str, id: Uuid) -> PortError {
    PortError::NotFound(format!("{} {} not found", entity, id))
}

#[async_trait]
impl UserRepository for FixtureDatabase {
    async fn create_user(&self, new_user: &NewUser) -> PortResult<User> {
        let mut tables = self.tables();
        if tables.users.iter().any(|(u, _)| u.email == new_user.email) {
            return Err(PortError::Conflict("User already exists".to_string()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            role: new_user.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables
            .users
            .push((user.clone(), new_user.hashed_password.clone()));
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.tables()
            .users
            .iter()
            .find(|(u, _)| u.id == user_id)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| not_found("User", user_id))
    }

    async fn get_user_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.tables()
            .users
            .iter()
            .find(|(u, _)| u.email == email)
            .map(|(u, hash)| UserCredentials {
                user_id: u.id,
                email: u.email.clone(),
                hashed_password: hash.clone(),
                is_active: u.is_active,
            })
            .ok_or_else(|| PortError::NotFound("User not found".to_string()))
    }

    async fn get_user_credentials_by_id(&self, user_id: Uuid) -> PortResult<UserCredentials> {
        let user = self.get_user_by_id(user_id).await?;
        self.get_user_credentials_by_email(&user.email).await
    }

    async fn list_users_by_role(&self, role: Role) -> PortResult<Vec<User>> {
        Ok(self
            .tables()
            .users
            .iter()
            .filter(|(u, _)| u.role == role)
            .map(|(u, _)| u.clone())
            .collect())
    }

    async fn update_user_profile(&self, user_id: Uuid, name: &str, email: &str) -> PortResult<User> {
        let mut tables = self.tables();
        if tables
            .users
            .iter()
            .any(|(u, _)| u.email == email && u.id != user_id)
        {
            return Err(PortError::Conflict("User with this email already exists".to_string()));
        }
        let (user, _) = tables
            .users
            .iter_mut()
            .find(|(u, _)| u.id == user_id)
            .ok_or_else(|| not_found("User", user_id))?;
        user.name = name.to_string();
        user.email = email.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_password_hash(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let mut tables = self.tables();
        let (_, hash) = tables
            .users
            .iter_mut()
            .find(|(u, _)| u.id == user_id)
            .ok_or_else(|| not_found("User", user_id))?;
        *hash = hashed_password.to_string();
        Ok(())
    }
}

#[async_trait]
impl AuthSessionStore for FixtureDatabase {
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables()
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        if self.session_store_down {
            return Err(PortError::Unexpected("connection refused".to_string()));
        }
        match self.tables().sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables().sessions.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl ModuleRepository for FixtureDatabase {
    async fn create_module(&self, instructor_id: Uuid, draft: &ModuleDraft) -> PortResult<Module> {
        let now = Utc::now();
        let module = Module {
            id: Uuid::new_v4(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            content: draft.content.clone(),
            instructor_id,
            estimated_duration_minutes: draft.estimated_duration_minutes,
            created_at: now,
            updated_at: now,
        };
        self.tables().modules.push(module.clone());
        Ok(module)
    }

    async fn get_module_by_id(&self, module_id: Uuid) -> PortResult<Module> {
        self.tables()
            .modules
            .iter()
            .find(|m| m.id == module_id)
            .cloned()
            .ok_or_else(|| not_found("Module", module_id))
    }

    async fn list_modules(&self, instructor_id: Option<Uuid>) -> PortResult<Vec<Module>> {
        Ok(self
            .tables()
            .modules
            .iter()
            .filter(|m| instructor_id.map_or(true, |id| m.instructor_id == id))
            .cloned()
            .collect())
    }

    async fn update_module(&self, module_id: Uuid, draft: &ModuleDraft) -> PortResult<Module> {
        let mut tables = self.tables();
        let module = tables
            .modules
            .iter_mut()
            .find(|m| m.id == module_id)
            .ok_or_else(|| not_found("Module", module_id))?;
        module.title = draft.title.clone();
        module.description = draft.description.clone();
        module.content = draft.content.clone();
        module.estimated_duration_minutes = draft.estimated_duration_minutes;
        module.updated_at = Utc::now();
        Ok(module.clone())
    }

    async fn delete_module_cascade(&self, module_id: Uuid) -> PortResult<u64> {
        let mut tables = self.tables();
        if !tables.modules.iter().any(|m| m.id == module_id) {
            return Err(not_found("Module", module_id));
        }
        let before = tables.assignments.len();
        tables.assignments.retain(|a| a.module_id != module_id);
        let removed = before - tables.assignments.len();
        tables.modules.retain(|m| m.id != module_id);
        Ok(removed as u64)
    }
}

/// Stages writes on a copy of the assignment table until `commit`.
struct FixtureTransaction {
    trainee_id: Uuid,
    tables: Arc<Mutex<Tables>>,
    staged: Vec<Assignment>,
}

#[async_trait]
impl AssignmentTransaction for FixtureTransaction {
    async fn current_module_ids(&mut self) -> PortResult<BTreeSet<Uuid>> {
        Ok(self
            .staged
            .iter()
            .filter(|a| a.trainee_id == self.trainee_id)
            .map(|a| a.module_id)
            .collect())
    }

    async fn remove_modules(&mut self, module_ids: &[Uuid]) -> PortResult<u64> {
        let trainee_id = self.trainee_id;
        let before = self.staged.len();
        self.staged
            .retain(|a| !(a.trainee_id == trainee_id && module_ids.contains(&a.module_id)));
        Ok((before - self.staged.len()) as u64)
    }

    async fn insert_assignments(&mut self, assignments: &[Assignment]) -> PortResult<u64> {
        let known: BTreeSet<Uuid> = self
            .tables
            .lock()
            .expect("fixture tables lock")
            .modules
            .iter()
            .map(|m| m.id)
            .collect();
        if let Some(missing) = assignments.iter().find(|a| !known.contains(&a.module_id)) {
            return Err(PortError::NotFound(format!(
                "Assignment references a missing module {}",
                missing.module_id
            )));
        }
        self.staged.extend_from_slice(assignments);
        Ok(assignments.len() as u64)
    }

    async fn commit(&mut self) -> PortResult<()> {
        self.tables
            .lock()
            .expect("fixture tables lock")
            .assignments = std::mem::take(&mut self.staged);
        Ok(())
    }
}

#[async_trait]
impl AssignmentRepository for FixtureDatabase {
    async fn begin_assignment_transaction(
        &self,
        trainee_id: Uuid,
    ) -> PortResult<Box<dyn AssignmentTransaction>> {
        Ok(Box::new(FixtureTransaction {
            trainee_id,
            tables: self.tables.clone(),
            staged: self.tables().assignments.clone(),
        }))
    }

    async fn get_assignment_by_id(&self, assignment_id: Uuid) -> PortResult<Assignment> {
        self.tables()
            .assignments
            .iter()
            .find(|a| a.id == assignment_id)
            .cloned()
            .ok_or_else(|| not_found("Assignment", assignment_id))
    }

    async fn list_assignments_for_trainee(&self, trainee_id: Uuid) -> PortResult<Vec<Assignment>> {
        Ok(self
            .tables()
            .assignments
            .iter()
            .filter(|a| a.trainee_id == trainee_id)
            .cloned()
            .collect())
    }

    async fn list_assignments_by_instructor(
        &self,
        instructor_id: Uuid,
    ) -> PortResult<Vec<Assignment>> {
        Ok(self
            .tables()
            .assignments
            .iter()
            .filter(|a| a.instructor_id == instructor_id)
            .cloned()
            .collect())
    }

    async fn list_assignments(&self) -> PortResult<Vec<Assignment>> {
        Ok(self.tables().assignments.clone())
    }

    async fn list_assignment_details_for_trainee(
        &self,
        trainee_id: Uuid,
    ) -> PortResult<Vec<AssignmentDetails>> {
        let tables = self.tables();
        Ok(tables
            .assignments
            .iter()
            .filter(|a| a.trainee_id == trainee_id)
            .filter_map(|a| {
                let module = tables.modules.iter().find(|m| m.id == a.module_id)?;
                Some(AssignmentDetails {
                    assignment: a.clone(),
                    module_title: module.title.clone(),
                    module_description: module.description.clone(),
                    estimated_duration_minutes: module.estimated_duration_minutes,
                })
            })
            .collect())
    }

    async fn complete_assignment(
        &self,
        assignment_id: Uuid,
        score: Option<i32>,
    ) -> PortResult<Assignment> {
        let mut tables = self.tables();
        let assignment = tables
            .assignments
            .iter_mut()
            .find(|a| a.id == assignment_id)
            .ok_or_else(|| not_found("Assignment", assignment_id))?;
        assignment.mark_completed(score, Utc::now());
        Ok(assignment.clone())
    }
}
