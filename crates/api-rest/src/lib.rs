//! # API REST
//!
//! REST API for the bed-management core.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON DTOs, status codes, CORS)
//!
//! Every request reads a fresh snapshot through [`BedService`]; nothing is cached here.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use leito_core::{
    risk::ordered_by_name, BedAssessment, BedService, CareLevel, CohortRestriction, CoreError,
    OccupancySummary, RegulationError, RegulationOutcome, StoreError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: BedService,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_restrictions,
        compatible_beds,
        list_risks,
        occupancy,
        conclude_regulation,
        regulation_history,
    ),
    components(schemas(
        HealthRes,
        RestrictionDto,
        RestrictionsRes,
        CompatibleBedsReq,
        BedDto,
        CompatibleBedsRes,
        RiskDetailDto,
        RiskDto,
        RisksRes,
        SectorOccupancyDto,
        OccupancyRes,
        ConcludeRegulationReq,
        ConcludeRegulationRes,
        RegulationHistoryDto,
        RegulationHistoryRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/beds/restrictions", get(list_restrictions))
        .route("/beds/compatible", post(compatible_beds))
        .route("/risks", get(list_risks))
        .route("/occupancy", get(occupancy))
        .route("/regulations/history", get(regulation_history))
        .route("/regulations/:patient_id/conclude", post(conclude_regulation))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RestrictionDto {
    pub bed_id: String,
    /// "M" or "F".
    pub sex: String,
    pub isolation_tags: Vec<String>,
}

impl RestrictionDto {
    fn new(bed_id: &str, restriction: &CohortRestriction) -> Self {
        Self {
            bed_id: bed_id.to_string(),
            sex: restriction.sex.as_str().to_string(),
            isolation_tags: restriction.isolation_tags.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RestrictionsRes {
    pub restrictions: Vec<RestrictionDto>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompatibleBedsReq {
    pub patient_id: String,
    /// "ward"/"enfermaria" or "icu"/"uti".
    pub care_level: String,
    /// Date used for age computation (YYYY-MM-DD); defaults to today (UTC).
    #[serde(default)]
    pub date: Option<String>,
    /// Also return rejected beds, each with the first rule it failed.
    #[serde(default)]
    pub include_rejected: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BedDto {
    pub id: String,
    pub code: String,
    pub status: String,
    pub sector_id: Option<String>,
    pub protected_pathway: bool,
    pub restriction: Option<RestrictionDto>,
    /// Present only for rejected beds.
    pub rejection: Option<String>,
}

impl From<BedAssessment> for BedDto {
    fn from(assessment: BedAssessment) -> Self {
        let BedAssessment {
            bed,
            restriction,
            rejection,
        } = assessment;
        Self {
            restriction: restriction.map(|r| RestrictionDto::new(&bed.id, &r)),
            rejection: rejection.map(|r| r.to_string()),
            status: bed.status.to_wire().to_string(),
            id: bed.id,
            code: bed.code,
            sector_id: bed.sector_id,
            protected_pathway: bed.protected_pathway,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompatibleBedsRes {
    pub patient_id: String,
    pub care_level: String,
    pub beds: Vec<BedDto>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RiskDetailDto {
    pub reason: String,
    pub location: String,
    pub companion_id: Option<String>,
    pub companion_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RiskDto {
    pub patient_id: String,
    pub patient_name: String,
    pub reasons: Vec<String>,
    pub details: Vec<RiskDetailDto>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RisksRes {
    /// Ordered by patient display name.
    pub risks: Vec<RiskDto>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SectorOccupancyDto {
    pub sector_id: String,
    pub sector_name: String,
    pub total_beds: usize,
    pub occupied_beds: usize,
    pub occupancy_rate: f64,
    pub isolated_patients: usize,
    pub incoming_regulations: usize,
    pub by_status: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OccupancyRes {
    pub total_beds: usize,
    pub occupied_beds: usize,
    pub occupancy_rate: f64,
    pub isolated_patients: usize,
    pub active_regulations: usize,
    pub sectors: Vec<SectorOccupancyDto>,
}

impl From<OccupancySummary> for OccupancyRes {
    fn from(summary: OccupancySummary) -> Self {
        Self {
            total_beds: summary.total_beds,
            occupied_beds: summary.occupied_beds,
            occupancy_rate: summary.occupancy_rate,
            isolated_patients: summary.isolated_patients,
            active_regulations: summary.active_regulations,
            sectors: summary
                .sectors
                .into_iter()
                .map(|sector| SectorOccupancyDto {
                    sector_id: sector.sector_id,
                    sector_name: sector.sector_name,
                    total_beds: sector.total_beds,
                    occupied_beds: sector.occupied_beds,
                    occupancy_rate: sector.occupancy_rate,
                    isolated_patients: sector.isolated_patients,
                    incoming_regulations: sector.incoming_regulations,
                    by_status: sector.by_status,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConcludeRegulationReq {
    /// Display name of the user concluding the regulation.
    pub concluded_by: String,
    #[serde(default)]
    pub extra_beds_to_release: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConcludeRegulationRes {
    pub destination_sector_id: Option<String>,
    pub destination_bed_id: Option<String>,
    pub duration_minutes: Option<i64>,
    pub touched_bed_ids: Vec<String>,
    pub audit_lines: Vec<String>,
}

impl From<RegulationOutcome> for ConcludeRegulationRes {
    fn from(outcome: RegulationOutcome) -> Self {
        Self {
            destination_sector_id: outcome.destination_sector_id,
            destination_bed_id: outcome.destination_bed_id,
            duration_minutes: outcome.duration_minutes,
            touched_bed_ids: outcome.touched_bed_ids,
            audit_lines: outcome.audit_lines,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegulationHistoryDto {
    pub id: String,
    pub status: String,
    pub patient_name: Option<String>,
    /// RFC 3339; absent when the stored value is unreadable.
    pub started_at: Option<String>,
    pub concluded_at: Option<String>,
    pub concluded_by: Option<String>,
    pub duration_minutes: Option<i64>,
    pub origin_bed_id: Option<String>,
    pub origin_sector_id: Option<String>,
    pub destination_bed_id: Option<String>,
    pub destination_sector_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegulationHistoryRes {
    /// Most recently concluded first.
    pub regulations: Vec<RegulationHistoryDto>,
}

// ============================================================================
// Handlers
// ============================================================================

type ApiError = (StatusCode, &'static str);

/// Map core failures to HTTP statuses, logging anything unexpected.
fn error_response(context: &str, err: CoreError) -> ApiError {
    match err {
        CoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid input"),
        CoreError::UnknownPatient(_) => (StatusCode::NOT_FOUND, "Unknown patient"),
        CoreError::Regulation(RegulationError::MissingActiveRegulation(_)) => {
            (StatusCode::CONFLICT, "Patient has no active regulation")
        }
        CoreError::Store(StoreError::Conflict { .. }) => {
            (StatusCode::CONFLICT, "Bed changed concurrently, retry")
        }
        CoreError::Store(StoreError::NotFound { .. }) => {
            (StatusCode::NOT_FOUND, "Referenced record not found")
        }
        other => {
            tracing::error!("{context} error: {:?}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Leito REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/beds/restrictions",
    responses(
        (status = 200, description = "Cohort restrictions of free beds", body = RestrictionsRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Cohort restrictions currently imposed on free beds, ordered by bed id.
#[axum::debug_handler]
async fn list_restrictions(
    State(state): State<AppState>,
) -> Result<Json<RestrictionsRes>, ApiError> {
    let restrictions = state
        .service
        .restrictions()
        .map_err(|e| error_response("List restrictions", e))?;

    let mut restrictions: Vec<RestrictionDto> = restrictions
        .iter()
        .map(|(bed_id, restriction)| RestrictionDto::new(bed_id, restriction))
        .collect();
    restrictions.sort_by(|a, b| a.bed_id.cmp(&b.bed_id));

    Ok(Json(RestrictionsRes { restrictions }))
}

#[utoipa::path(
    post,
    path = "/beds/compatible",
    request_body = CompatibleBedsReq,
    responses(
        (status = 200, description = "Candidate beds", body = CompatibleBedsRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Unknown patient"),
        (status = 500, description = "Internal server error")
    )
)]
/// Beds a patient may take at the requested care level.
#[axum::debug_handler]
async fn compatible_beds(
    State(state): State<AppState>,
    Json(req): Json<CompatibleBedsReq>,
) -> Result<Json<CompatibleBedsRes>, ApiError> {
    let care_level: CareLevel = req
        .care_level
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid care level"))?;

    let today = match req.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid date"))?,
        None => Utc::now().date_naive(),
    };

    let assessments = if req.include_rejected {
        state.service.assess_beds(&req.patient_id, care_level, today)
    } else {
        state
            .service
            .compatible_beds(&req.patient_id, care_level, today)
    }
    .map_err(|e| error_response("Compatible beds", e))?;

    Ok(Json(CompatibleBedsRes {
        patient_id: req.patient_id,
        care_level: format!("{care_level:?}").to_lowercase(),
        beds: assessments.into_iter().map(BedDto::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/risks",
    responses(
        (status = 200, description = "Contamination risks", body = RisksRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Contamination risks of isolated patients, ordered by patient name.
#[axum::debug_handler]
async fn list_risks(State(state): State<AppState>) -> Result<Json<RisksRes>, ApiError> {
    let (snapshot, reports) = state
        .service
        .risks()
        .map_err(|e| error_response("List risks", e))?;

    let risks = ordered_by_name(&reports, &snapshot.patients)
        .into_iter()
        .map(|(patient, report)| RiskDto {
            patient_id: patient.id.clone(),
            patient_name: patient.display_name().to_string(),
            reasons: report.reasons.iter().map(|r| reason_label(*r)).collect(),
            details: report
                .details
                .iter()
                .map(|detail| RiskDetailDto {
                    reason: reason_label(detail.reason),
                    location: detail.location.clone(),
                    companion_id: detail.companion_id.clone(),
                    companion_name: detail.companion_name.clone(),
                })
                .collect(),
        })
        .collect();

    Ok(Json(RisksRes { risks }))
}

fn reason_label(reason: leito_core::RiskReason) -> String {
    serde_json::to_value(reason)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{reason:?}"))
}

#[utoipa::path(
    get,
    path = "/occupancy",
    responses(
        (status = 200, description = "Occupancy indicators", body = OccupancyRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Occupancy indicators per sector and hospital-wide.
#[axum::debug_handler]
async fn occupancy(State(state): State<AppState>) -> Result<Json<OccupancyRes>, ApiError> {
    let summary = state
        .service
        .occupancy()
        .map_err(|e| error_response("Occupancy", e))?;
    Ok(Json(summary.into()))
}

#[utoipa::path(
    post,
    path = "/regulations/{patient_id}/conclude",
    params(
        ("patient_id" = String, Path, description = "Patient whose regulation is concluded")
    ),
    request_body = ConcludeRegulationReq,
    responses(
        (status = 200, description = "Regulation concluded", body = ConcludeRegulationRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Unknown patient or bed"),
        (status = 409, description = "No active regulation, or a bed changed concurrently"),
        (status = 500, description = "Internal server error")
    )
)]
/// Conclude a patient's active regulation.
///
/// All record updates are committed atomically; the audit trail is appended best-effort.
#[axum::debug_handler]
async fn conclude_regulation(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<String>,
    Json(req): Json<ConcludeRegulationReq>,
) -> Result<Json<ConcludeRegulationRes>, ApiError> {
    let outcome = state
        .service
        .conclude_regulation(
            &patient_id,
            req.extra_beds_to_release,
            &req.concluded_by,
            Utc::now(),
        )
        .map_err(|e| error_response("Conclude regulation", e))?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    get,
    path = "/regulations/history",
    responses(
        (status = 200, description = "Concluded regulations", body = RegulationHistoryRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Concluded regulations, most recent first.
#[axum::debug_handler]
async fn regulation_history(
    State(state): State<AppState>,
) -> Result<Json<RegulationHistoryRes>, ApiError> {
    let history = state
        .service
        .regulation_history()
        .map_err(|e| error_response("Regulation history", e))?;

    let rfc3339 = |value: Option<DateTime<Utc>>| value.map(|at| at.to_rfc3339());
    let regulations = history
        .into_iter()
        .map(|record| RegulationHistoryDto {
            started_at: rfc3339(record.iniciado_em.as_ref().and_then(|t| t.to_datetime())),
            concluded_at: rfc3339(record.data_conclusao.as_ref().and_then(|t| t.to_datetime())),
            id: record.id,
            status: record.status,
            patient_name: record.paciente_nome,
            concluded_by: record.user_name_conclusao,
            duration_minutes: record.tempo_regulacao_minutos,
            origin_bed_id: record.leito_origem_id,
            origin_sector_id: record.setor_origem_id,
            destination_bed_id: record.leito_destino_final_id,
            destination_sector_id: record.setor_destino_final_id,
        })
        .collect();

    Ok(Json(RegulationHistoryRes { regulations }))
}
