use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use metrics::counter;
use serde::Serialize;
use tracing::debug;

use contact_relay_core::{ContactForm, ValidationError};

use crate::pipeline::SubmitError;
use crate::problem::ProblemResponse;
use crate::router::AppState;

const ACCEPTED_MESSAGE: &str = "Successfully sent contact form";
const FAILED_MESSAGE: &str = "Failed to submit contact form";

#[derive(Debug, Serialize)]
pub struct Acknowledgement {
    message: &'static str,
}

/// `POST /api/v1/contact`.
///
/// The body is decoded by hand so that every decode failure maps to a 400
/// problem instead of axum's JSON rejections.
pub async fn submit(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Acknowledgement>, ProblemResponse> {
    let form: ContactForm = serde_json::from_slice(&body).map_err(|err| {
        counter!("contact_submissions_total", "result" => "rejected").increment(1);
        debug!(stage = "ingress", error = %err, "contact payload could not be decoded");
        ProblemResponse::invalid(&ValidationError::MalformedPayload)
    })?;

    match state.pipeline().submit(form).await {
        Ok(()) => Ok(Json(Acknowledgement {
            message: ACCEPTED_MESSAGE,
        })),
        Err(SubmitError::Validation(err)) => Err(ProblemResponse::invalid(&err)),
        Err(SubmitError::Storage(_)) => Err(ProblemResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "submission_failed",
            FAILED_MESSAGE,
        )),
    }
}
