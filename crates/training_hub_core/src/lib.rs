pub mod domain;
pub mod ports;
pub mod progress;
pub mod reconcile;

pub use domain::{
    Assignment, AssignmentDetails, AssignmentStatus, Module, ModuleDraft, NewUser,
    Role, User, UserCredentials,
};
pub use ports::{
    AssignmentRepository, AssignmentTransaction, AuthSessionStore, DatabaseService,
    ModuleRepository, PortError, PortResult, UserRepository,
};
pub use progress::{ProgressOverview, ProgressStats, StatusDistribution};
pub use reconcile::{reconcile_assignments, AssignmentSelection, ReconcileOutcome};
