use axum::{extract::State, Form};

use super::AppState;
use crate::actions::{FormFields, MutationOutcome};

pub async fn create_task(
    State(state): State<AppState>,
    Form(form): Form<FormFields>,
) -> MutationOutcome {
    state.actions().create_task(&form).await
}

pub async fn update_task(
    State(state): State<AppState>,
    Form(form): Form<FormFields>,
) -> MutationOutcome {
    state.actions().update_task(&form).await
}

pub async fn delete_task(
    State(state): State<AppState>,
    Form(form): Form<FormFields>,
) -> MutationOutcome {
    state.actions().delete_task(&form).await
}

pub async fn toggle_task(
    State(state): State<AppState>,
    Form(form): Form<FormFields>,
) -> MutationOutcome {
    state.actions().toggle_task(&form).await
}
