use rusqlite::{params, Connection, OptionalExtension};

use super::lab_order::{json_column, row_to_case_record};
use crate::db::DatabaseError;
use crate::models::*;

const JOINED_SELECT: &str = "SELECT e.order_id, e.strategy, e.dimension, e.embedding_vector, e.metadata,
         o.id, o.recorded_at, o.patient_age, o.patient_gender, o.triage_category, o.diagnosis,
         o.comorbidities, o.vital_signs, o.symptom_duration, o.pain_scale, o.additional_notes,
         o.laboratory_values, o.reasoning, o.estimated_duration, o.urgency_level, o.cost_efficiency,
         o.quality_check, o.session_id
         FROM case_embeddings e
         JOIN laboratory_orders o ON e.order_id = o.id";

/// Persist a fingerprint and its metadata for an existing order.
pub fn insert_case_embedding(
    conn: &Connection,
    order_id: CaseId,
    fingerprint: &Fingerprint,
    metadata: &CaseMetadata,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO case_embeddings (order_id, strategy, dimension, embedding_vector, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            order_id.0,
            fingerprint.kind.label(),
            fingerprint.dimension() as i64,
            serde_json::to_string(&fingerprint.values)?,
            serde_json::to_string(metadata)?,
        ],
    )?;
    Ok(())
}

/// All fingerprinted cases in insertion order.
pub fn get_all_case_embeddings(conn: &Connection) -> Result<Vec<StoredCase>, DatabaseError> {
    let sql = format!("{JOINED_SELECT} ORDER BY o.id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_stored_case)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn get_case_embedding(
    conn: &Connection,
    order_id: CaseId,
) -> Result<Option<StoredCase>, DatabaseError> {
    let sql = format!("{JOINED_SELECT} WHERE e.order_id = ?1");
    let stored = conn
        .query_row(&sql, params![order_id.0], row_to_stored_case)
        .optional()?;
    Ok(stored)
}

/// Whether the order already carries a fingerprint.
pub fn case_embedding_exists(conn: &Connection, order_id: CaseId) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM case_embeddings WHERE order_id = ?1)",
        params![order_id.0],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn row_to_stored_case(row: &rusqlite::Row<'_>) -> Result<StoredCase, rusqlite::Error> {
    let strategy: String = row.get(1)?;
    let dimension: i64 = row.get(2)?;
    let values: Vec<f32> = json_column(row, 3)?;

    if values.len() as i64 != dimension {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("fingerprint has {} values, expected {dimension}", values.len()).into(),
        ));
    }

    Ok(StoredCase {
        case_id: CaseId(row.get(0)?),
        fingerprint: Fingerprint::new(FingerprintKind::from_label(&strategy), values),
        metadata: json_column(row, 4)?,
        record: row_to_case_record(row, 5)?,
    })
}
