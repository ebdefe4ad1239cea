//! Regulation transition protocol.
//!
//! Concluding a regulation touches several records at once: the patient, the origin bed,
//! the destination bed, any extra beds being released and the regulation history. All of
//! those writes are staged on one caller-supplied [`WriteBatch`]; the caller commits it as
//! a unit. The protocol performs no I/O and returns the audit text for the caller to persist.

use crate::constants::{REGULATION_STATUS_CONCLUDED, UNKNOWN_LOCATION};
use crate::error::RegulationError;
use crate::model::{Bed, BedStatus, Patient, Sector, SectorType, StatusChange};
use crate::temporal::minutes_between;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Transaction handle the protocol stages its writes on.
pub trait WriteBatch {
    fn update_patient(&mut self, update: PatientUpdate);

    fn update_bed(&mut self, update: BedUpdate);

    /// Insert or replace the history record keyed by `record.patient_id`.
    fn upsert_regulation_history(&mut self, record: RegulationHistory);
}

/// Field-level patient update; fields not named here are left untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientUpdate {
    pub patient_id: String,
    pub bed_id: Option<String>,
    pub sector_id: Option<String>,
    pub clear_active_regulation: bool,
    pub clear_icu_request: bool,
    pub clear_relocation_request: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BedUpdate {
    pub bed_id: String,
    pub status: BedStatus,
    /// Appended to the bed's status history.
    pub history_entry: StatusChange,
    /// Status observed when the update was staged; commit fails if it changed since.
    pub expected_status: Option<BedStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegulationHistory {
    pub patient_id: String,
    pub status: String,
    pub patient_name: String,
    pub started_at: Option<DateTime<Utc>>,
    /// `None` lets the store stamp its own clock at commit.
    pub concluded_at: Option<DateTime<Utc>>,
    pub concluded_by: String,
    /// `None` when the start timestamp is missing or unusable.
    pub duration_minutes: Option<i64>,
    pub origin_bed_id: Option<String>,
    pub origin_sector_id: Option<String>,
    pub destination_bed_id: Option<String>,
    pub destination_sector_id: Option<String>,
}

/// Inputs of one conclusion. Records are optional; ids fall back to the active regulation.
#[derive(Clone, Debug)]
pub struct ConcludeRequest<'a> {
    pub patient: &'a Patient,
    pub origin_bed: Option<&'a Bed>,
    pub origin_sector: Option<&'a Sector>,
    pub destination_bed: Option<&'a Bed>,
    pub destination_sector: Option<&'a Sector>,
    pub extra_beds_to_release: Vec<String>,
    /// Display name of the user concluding the regulation.
    pub concluded_by: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegulationOutcome {
    pub destination_sector_id: Option<String>,
    pub destination_bed_id: Option<String>,
    pub duration_minutes: Option<i64>,
    /// Every bed written by the batch, first occurrence order.
    pub touched_bed_ids: Vec<String>,
    pub audit_lines: Vec<String>,
}

/// Stage the conclusion of `request.patient`'s active regulation on `tx`.
///
/// # Errors
///
/// - [`RegulationError::MissingActiveRegulation`] when the patient has no active regulation
/// - [`RegulationError::MissingTransaction`] when no write batch is supplied
///
/// Nothing is staged when an error is returned.
pub fn conclude_regulation<W: WriteBatch + ?Sized>(
    tx: Option<&mut W>,
    request: &ConcludeRequest<'_>,
    reference_time: DateTime<Utc>,
) -> Result<RegulationOutcome, RegulationError> {
    let patient = request.patient;
    let regulation = patient
        .active_regulation
        .as_ref()
        .ok_or_else(|| RegulationError::MissingActiveRegulation(patient.id.clone()))?;
    let tx = tx.ok_or(RegulationError::MissingTransaction)?;

    let origin_bed_id = request
        .origin_bed
        .map(|bed| bed.id.clone())
        .or_else(|| regulation.origin_bed_id.clone())
        .or_else(|| patient.bed_id.clone());
    let origin_sector_id = request
        .origin_sector
        .map(|sector| sector.id.clone())
        .or_else(|| regulation.origin_sector_id.clone())
        .or_else(|| request.origin_bed.and_then(|bed| bed.sector_id.clone()));
    let destination_bed_id = request
        .destination_bed
        .map(|bed| bed.id.clone())
        .or_else(|| regulation.destination_bed_id.clone());
    let destination_sector_id = request
        .destination_sector
        .map(|sector| sector.id.clone())
        .or_else(|| regulation.destination_sector_id.clone())
        .or_else(|| request.destination_bed.and_then(|bed| bed.sector_id.clone()));

    let to_icu = request
        .destination_sector
        .is_some_and(|sector| sector.kind == SectorType::Icu);
    let fulfilled_icu_request = patient.icu_request.as_ref().filter(|_| to_icu);

    tx.update_patient(PatientUpdate {
        patient_id: patient.id.clone(),
        bed_id: destination_bed_id.clone(),
        sector_id: destination_sector_id.clone(),
        clear_active_regulation: true,
        clear_icu_request: fulfilled_icu_request.is_some(),
        clear_relocation_request: patient.relocation_request.is_some(),
    });

    let mut touched_bed_ids: Vec<String> = Vec::new();
    let mut stage_bed = |bed_id: &str,
                         status: BedStatus,
                         occupant: Option<&str>,
                         expected: Option<&BedStatus>| {
        if touched_bed_ids.iter().any(|id| id == bed_id) {
            tracing::debug!(bed_id, "bed already staged in this batch");
            return;
        }
        touched_bed_ids.push(bed_id.to_string());
        tx.update_bed(BedUpdate {
            bed_id: bed_id.to_string(),
            history_entry: StatusChange {
                status: status.clone(),
                at: Some(reference_time),
                patient_id: occupant.map(str::to_string),
            },
            status,
            expected_status: expected.cloned(),
        });
    };

    if let Some(bed_id) = origin_bed_id.as_deref() {
        let expected = request
            .origin_bed
            .filter(|bed| bed.id == bed_id)
            .map(|bed| &bed.status);
        stage_bed(bed_id, BedStatus::Cleaning, None, expected);
    }
    if let Some(bed_id) = destination_bed_id.as_deref() {
        let expected = request
            .destination_bed
            .filter(|bed| bed.id == bed_id)
            .map(|bed| &bed.status);
        stage_bed(bed_id, BedStatus::Occupied, Some(&patient.id), expected);
    }
    for bed_id in &request.extra_beds_to_release {
        let bed_id = bed_id.trim();
        if !bed_id.is_empty() {
            stage_bed(bed_id, BedStatus::Vacant, None, None);
        }
    }

    let duration_minutes = minutes_between(regulation.started_at, reference_time);
    let patient_name = regulation
        .patient_name
        .as_deref()
        .unwrap_or_else(|| patient.display_name())
        .to_string();

    tx.upsert_regulation_history(RegulationHistory {
        patient_id: patient.id.clone(),
        status: REGULATION_STATUS_CONCLUDED.to_string(),
        patient_name: patient_name.clone(),
        started_at: regulation.started_at,
        concluded_at: None,
        concluded_by: request.concluded_by.clone(),
        duration_minutes,
        origin_bed_id: origin_bed_id.clone(),
        origin_sector_id: origin_sector_id.clone(),
        destination_bed_id: destination_bed_id.clone(),
        destination_sector_id: destination_sector_id.clone(),
    });

    let origin = describe_location(
        request.origin_sector,
        origin_sector_id.as_deref(),
        request.origin_bed,
        origin_bed_id.as_deref(),
    );
    let destination = describe_location(
        request.destination_sector,
        destination_sector_id.as_deref(),
        request.destination_bed,
        destination_bed_id.as_deref(),
    );

    let mut audit_lines = vec![format!(
        "Regulação de {patient_name} concluída: de {origin} para {destination} ({}).",
        describe_minutes(duration_minutes)
    )];
    if let Some(wait) = fulfilled_icu_request
        .and_then(|request| minutes_between(request.requested_at, reference_time))
    {
        audit_lines.push(format!(
            "Pedido de UTI de {patient_name} atendido em {destination} \
             após {wait} minutos de espera."
        ));
    }

    Ok(RegulationOutcome {
        destination_sector_id,
        destination_bed_id,
        duration_minutes,
        touched_bed_ids,
        audit_lines,
    })
}

/// `"<sector name> - <bed code>"`, falling back to raw ids, then to "não informado".
pub fn describe_location(
    sector: Option<&Sector>,
    sector_id: Option<&str>,
    bed: Option<&Bed>,
    bed_id: Option<&str>,
) -> String {
    let sector_part = sector.map(|sector| sector.name.as_str()).or(sector_id);
    let bed_part = bed.map(|bed| bed.code.as_str()).or(bed_id);
    match (sector_part, bed_part) {
        (Some(sector), Some(bed)) => format!("{sector} - {bed}"),
        (Some(only), None) | (None, Some(only)) => only.to_string(),
        (None, None) => UNKNOWN_LOCATION.to_string(),
    }
}

fn describe_minutes(minutes: Option<i64>) -> String {
    match minutes {
        Some(1) => "1 minuto".to_string(),
        Some(minutes) => format!("{minutes} minutos"),
        None => "tempo não informado".to_string(),
    }
}
