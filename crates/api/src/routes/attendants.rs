use axum::{
    extract::{Extension, State},
    Json,
};
use chatdesk_shared::Scope;
use serde::Serialize;

use crate::{
    auth::AuthUser,
    error::ApiResult,
    services::AttendantLoad,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct WorkloadResponse {
    pub attendants: Vec<AttendantLoad>,
}

/// GET /attendants/workload
///
/// Open-conversation count per attendant, in assignment enumeration order.
pub async fn workload(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<WorkloadResponse>> {
    auth_user.require_scope(Scope::ConversationsRead)?;

    let attendants = state.ingest.assigner().loads().await?;
    Ok(Json(WorkloadResponse { attendants }))
}
