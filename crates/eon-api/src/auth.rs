use axum::{
    Extension, Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{error, warn};
use url::form_urlencoded;

use eon_client::{HandoffError, SignInError, SignUpError};
use eon_types::api::{PageQuery, SignInForm, SignInPage, SignUpForm, SignUpPage};
use eon_types::models::SelectionSet;

use crate::error::ApiError;
use crate::middleware::DeviceId;
use crate::state::AppState;

const SIGNED_IN_TARGET: &str = "/#community-section";

/// `path?message=…&email=…`, form-encoded.
fn with_notice(path: &str, message: &str, email: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("message", message)
        .append_pair("email", email)
        .finish();
    format!("{}?{}", path, query)
}

pub async fn sign_in_page(Query(query): Query<PageQuery>) -> Json<SignInPage> {
    Json(SignInPage {
        email: query.email.unwrap_or_default(),
        message: query.message,
        error: None,
    })
}

pub async fn sign_in(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
    Form(form): Form<SignInForm>,
) -> Response {
    let device = state.device(device_id).await;
    let session = device.lock().await;

    match session.gateway.sign_in(&form.email, &form.password).await {
        Ok(_) => Redirect::to(SIGNED_IN_TARGET).into_response(),
        Err(SignInError::AccountNotFound) => Redirect::to(&with_notice(
            "/signup",
            "Please sign up to join our community",
            &form.email,
        ))
        .into_response(),
        Err(SignInError::Rejected(message)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(SignInPage {
                email: form.email,
                message: None,
                error: Some(message),
            }),
        )
            .into_response(),
    }
}

pub async fn sign_up_page(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
    Query(query): Query<PageQuery>,
) -> Json<SignUpPage> {
    let device = state.device(device_id).await;
    let session = device.lock().await;

    let pending_selections = session.handoff.pending().await.unwrap_or_else(|e| {
        warn!("Failed to read pending selections: {}", e);
        SelectionSet::new()
    });

    Json(SignUpPage {
        email: query.email.unwrap_or_default(),
        message: query.message,
        error: None,
        pending_selections,
    })
}

pub async fn sign_up(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
    Form(form): Form<SignUpForm>,
) -> Response {
    let device = state.device(device_id).await;
    let session = device.lock().await;

    let result = session
        .handoff
        .sign_up(&session.gateway, &form.email, &form.password, &form.nickname)
        .await;

    let (status, message) = match result {
        Ok(_) => return Redirect::to(SIGNED_IN_TARGET).into_response(),
        Err(HandoffError::SignUp(SignUpError::AlreadyRegistered)) => {
            return Redirect::to(&with_notice(
                "/signin",
                "Please sign in with your existing account",
                &form.email,
            ))
            .into_response();
        }
        Err(HandoffError::SignUp(SignUpError::SelectionsNotSaved { source, .. })) => {
            (StatusCode::BAD_GATEWAY, source.to_string())
        }
        Err(HandoffError::SignUp(SignUpError::Rejected(message))) => {
            (StatusCode::UNPROCESSABLE_ENTITY, message)
        }
        Err(e @ HandoffError::Storage(_)) => {
            error!("Sign-up aborted: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    };

    let pending_selections = session.handoff.pending().await.unwrap_or_default();
    (
        status,
        Json(SignUpPage {
            email: form.email,
            message: None,
            error: Some(message),
            pending_selections,
        }),
    )
        .into_response()
}

pub async fn sign_out(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
) -> Result<Redirect, ApiError> {
    let device = state.device(device_id).await;
    let session = device.lock().await;
    session.gateway.sign_out().await?;
    Ok(Redirect::to("/"))
}
