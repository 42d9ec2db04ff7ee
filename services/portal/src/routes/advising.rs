//! Advising routes under `/advising`

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use super::EmailQuery;
use crate::{
    AppState,
    error::PortalError,
    models::{AdvisingRecord, AdvisingStatus, PlannedCourse},
    services::PlanSubmission,
};

/// Student-facing routes; the admin routes are mounted separately
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/advising/current-courses", get(current_courses))
        .route("/advising/get-current-courses", get(current_courses))
        .route("/advising/taken-courses", get(taken_courses))
        .route("/advising/get-taken-courses", get(taken_courses))
        .route("/advising/forms", get(list_forms))
        .route("/advising/get-advising-forms", get(list_forms))
        .route("/advising/form", get(get_form))
        .route("/advising/get-form-by-id", get(get_form))
        .route("/advising/save", post(save_form))
        .route("/advising/save-form", post(save_form))
        .route("/advising/summary", get(summary))
        .route("/advising/history", get(history))
        .route("/advising/last-courses", get(last_courses))
        .route("/advising/check-admin", post(check_admin))
}

/// Routes behind the admin session check
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/advising/admin/decision", post(decide))
        .route("/advising/admin/sync-approved", post(sync_approved))
}

#[derive(Serialize)]
pub struct FormSummary {
    pub id: i64,
    pub current_term: String,
    pub status: AdvisingStatus,
    pub created_at: String,
}

impl From<AdvisingRecord> for FormSummary {
    fn from(record: AdvisingRecord) -> Self {
        Self {
            id: record.id,
            current_term: record.current_term,
            status: record.status,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct CourseRow {
    pub course_name: String,
    pub course_level: Option<String>,
    pub status: String,
    pub term: String,
}

impl From<PlannedCourse> for CourseRow {
    fn from(course: PlannedCourse) -> Self {
        Self {
            course_name: course.course_name,
            course_level: course.course_level,
            status: course.status.as_str().to_string(),
            term: course.term,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormQuery {
    #[serde(default, alias = "id", deserialize_with = "optional_id")]
    pub form_id: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFormRequest {
    #[serde(default, alias = "id", deserialize_with = "optional_id")]
    pub form_id: Option<i64>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub current_term: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub last_term: Option<String>,
    #[serde(
        default,
        rename = "lastGPA",
        alias = "lastGpa",
        deserialize_with = "optional_text"
    )]
    pub last_gpa: Option<String>,
    #[serde(default)]
    pub selected_courses: Vec<String>,
}

#[derive(Deserialize)]
pub struct DecisionRequest {
    #[serde(default, alias = "formId", deserialize_with = "optional_id")]
    pub id: Option<i64>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct LastCoursesQuery {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub term: String,
}

#[derive(Deserialize)]
pub struct CheckAdminRequest {
    #[serde(default)]
    pub email: String,
}

pub async fn current_courses(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<EmailQuery>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let courses = state.advising.current_courses(query.required()?).await?;
    Ok(Json(courses))
}

pub async fn taken_courses(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<EmailQuery>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let courses = state.advising.taken_courses(query.required()?).await?;
    Ok(Json(courses))
}

pub async fn list_forms(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<EmailQuery>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let forms: Vec<FormSummary> = state
        .advising
        .list_forms(query.required()?)
        .await?
        .into_iter()
        .map(FormSummary::from)
        .collect();
    Ok(Json(forms))
}

pub async fn get_form(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<FormQuery>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let form_id = query
        .form_id
        .ok_or_else(|| PortalError::Validation("formId is required".to_string()))?;
    let detail = state.advising.get_form(form_id).await?;
    let record = detail.record;

    Ok(Json(json!({
        "form": {
            "id": record.id,
            "current_term": record.current_term,
            "last_term": record.last_term,
            "last_gpa": record.last_gpa,
            "status": record.status,
            "advisor_message": record.advisor_message,
            "created_at": record.created_at.to_rfc3339(),
        },
        "selectedCourses": detail
            .courses
            .into_iter()
            .map(CourseRow::from)
            .collect::<Vec<_>>(),
    })))
}

pub async fn save_form(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<SaveFormRequest>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let advising_id = state
        .advising
        .save_form(PlanSubmission {
            form_id: payload.form_id,
            email: payload.email,
            current_term: payload.current_term,
            last_term: payload.last_term,
            last_gpa: payload.last_gpa,
            selected_courses: payload.selected_courses,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "advisingId": advising_id,
    })))
}

pub async fn summary(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<EmailQuery>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let summary = match state.advising.summary(query.required()?).await? {
        Some(record) => json!({
            "currentTerm": record.current_term,
            "lastTerm": record.last_term,
            "lastGpa": record.last_gpa,
            "status": record.status,
        }),
        None => json!({}),
    };
    Ok(Json(summary))
}

pub async fn history(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<EmailQuery>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let rows: Vec<Value> = state
        .advising
        .history(query.required()?)
        .await?
        .into_iter()
        .map(|entry| {
            json!({
                "id": entry.record.id,
                "date": entry.record.created_at.format("%m/%d/%Y").to_string(),
                "term": entry.record.current_term,
                "status": entry.record.status,
                "courses": entry.courses.join(", "),
            })
        })
        .collect();
    Ok(Json(rows))
}

pub async fn last_courses(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<LastCoursesQuery>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let rows: Vec<Value> = state
        .advising
        .last_courses(&query.email, &query.term)
        .await?
        .into_iter()
        .map(|course| json!({ "courseName": course.course_name, "grade": course.grade }))
        .collect();
    Ok(Json(rows))
}

pub async fn check_admin(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<CheckAdminRequest>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let is_admin = state.auth.is_admin(&payload.email).await?;
    Ok(Json(json!({ "isAdmin": is_admin })))
}

pub async fn decide(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<DecisionRequest>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let id = payload
        .id
        .ok_or_else(|| PortalError::Validation("id is required".to_string()))?;
    let status: AdvisingStatus = payload
        .status
        .parse()
        .map_err(PortalError::Validation)?;

    state
        .advising
        .decide(id, status, payload.message.as_deref())
        .await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn sync_approved(State(state): State<AppState>) -> Result<impl IntoResponse, PortalError> {
    let synced = state.advising.sync_approved().await?;
    Ok(Json(json!({
        "message": format!("Synced {} approved courses.", synced),
        "synced": synced,
    })))
}

/// Ids arrive as numbers from JSON bodies and as strings from query strings
/// and form fields; blank means absent.
fn optional_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("id must be an integer")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom("id must be an integer")),
        Some(_) => Err(serde::de::Error::custom("id must be an integer")),
    }
}

/// GPA fields are sent both as `3.5` and `"3.5"`
fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(serde::de::Error::custom("expected a string or number")),
    }
}
