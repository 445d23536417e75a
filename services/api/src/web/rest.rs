//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification. Every REST handler and
//! payload schema is listed here so both the Swagger UI and the `openapi`
//! binary see the same document.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::web::{analytics, assignments, auth, modules, users};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        users::current_user_handler,
        users::update_profile_handler,
        users::change_password_handler,
        users::list_users_handler,
        modules::list_modules_handler,
        modules::get_module_handler,
        modules::create_module_handler,
        modules::update_module_handler,
        modules::delete_module_handler,
        assignments::list_assignments_handler,
        assignments::reconcile_assignments_handler,
        assignments::update_assignment_status_handler,
        analytics::trainee_progress_handler,
        analytics::module_progress_handler,
        analytics::overview_handler,
    ),
    components(
        schemas(
            ErrorResponse,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            users::UserResponse,
            users::UpdateProfileRequest,
            users::ChangePasswordRequest,
            users::MessageResponse,
            modules::ModuleRequest,
            modules::ModuleResponse,
            modules::DeleteModuleResponse,
            assignments::AssignedModuleSummary,
            assignments::AssignmentResponse,
            assignments::ReconcileAssignmentsRequest,
            assignments::ReconcileAssignmentsResponse,
            assignments::UpdateAssignmentStatusRequest,
            assignments::UpdateAssignmentStatusResponse,
            analytics::ProgressStatsResponse,
            analytics::StatusDistributionResponse,
            analytics::OverviewResponse,
        )
    ),
    tags(
        (name = "Training Hub API", description = "Modules, trainee assignments and progress tracking for instructor-led training.")
    )
)]
pub struct ApiDoc;
