//! Pro subscription through Stripe Checkout

use crate::auth::SessionUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::web::redirect_with_session;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::{Redirect, Response},
};
use datasentinel_core::AppError;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/datasentinel/subscribe/pro",
    tag = "billing",
    responses(
        (status = 303, description = "Redirect to Stripe Checkout"),
        (status = 401, description = "Login required", body = ErrorResponse),
        (status = 502, description = "Stripe unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn subscribe_pro(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Redirect, HttpAppError> {
    let checkout = state
        .billing
        .create_checkout_session(session.email())
        .await?;
    let url = checkout
        .url
        .ok_or_else(|| AppError::StripeError("Checkout session has no URL".to_string()))?;

    Ok(Redirect::to(&url))
}

#[utoipa::path(
    get,
    path = "/datasentinel/subscription/success",
    tag = "billing",
    params(SuccessQuery),
    responses(
        (status = 303, description = "Pro enabled; redirect to the dashboard"),
        (status = 400, description = "Missing or foreign session id", body = ErrorResponse),
        (status = 402, description = "Checkout not paid", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn subscription_success(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
    Query(query): Query<SuccessQuery>,
) -> Result<Response, HttpAppError> {
    let session_id = query
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing session_id".to_string()))?;

    let checkout = state.billing.retrieve_checkout_session(&session_id).await?;
    if !checkout.is_paid() {
        return Err(AppError::SubscriptionRequired(
            "Checkout has not been paid".to_string(),
        )
        .into());
    }
    if let Some(email) = checkout.email() {
        if !email.eq_ignore_ascii_case(session.email()) {
            return Err(AppError::BadRequest(
                "Checkout session belongs to another account".to_string(),
            )
            .into());
        }
    }

    let user = state
        .users
        .set_pro(session.email(), checkout.customer.as_deref())
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;
    tracing::info!(checkout_id = %checkout.id, "Pro subscription activated");

    Ok(redirect_with_session(
        &state,
        &state.url("/dashboard"),
        &user,
    )?)
}

#[utoipa::path(
    get,
    path = "/datasentinel/subscription/cancel",
    tag = "billing",
    responses((status = 303, description = "Back to the start page"))
)]
pub async fn subscription_cancel(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::to(state.base_path())
}
