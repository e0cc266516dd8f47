use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Local;
use ksc_core::{ical::generator::Emitter, startplan_client};

/// Handle calendar requests.
///
/// The feed always starts at the current day; past releases are not served.
pub async fn handler() -> Result<Response, (StatusCode, String)> {
    let ical_calendar = startplan_client::get(Local::now().date_naive())
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let response = ([(CONTENT_TYPE, "text/calendar")], ical_calendar.generate()).into_response();
    Ok(response)
}
