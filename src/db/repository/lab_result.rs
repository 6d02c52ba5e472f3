use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::*;

/// Attach measured values to an order. All rows are written or none.
pub fn insert_lab_results(
    conn: &Connection,
    order_id: CaseId,
    results: &[LabMeasurement],
) -> Result<usize, DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    for result in results {
        tx.execute(
            "INSERT INTO laboratory_results
             (order_id, parameter_name, value, unit, reference_min, reference_max, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                order_id.0,
                result.parameter_name,
                result.value,
                result.unit,
                result.reference_min,
                result.reference_max,
                result.status.as_str(),
            ],
        )?;
    }

    tx.commit()?;
    Ok(results.len())
}

pub fn get_lab_results_for_order(
    conn: &Connection,
    order_id: CaseId,
) -> Result<Vec<LabMeasurement>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT parameter_name, value, unit, reference_min, reference_max, status
         FROM laboratory_results WHERE order_id = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![order_id.0], |row| {
        let status: String = row.get(5)?;
        Ok(LabMeasurement {
            parameter_name: row.get(0)?,
            value: row.get(1)?,
            unit: row.get(2)?,
            reference_min: row.get(3)?,
            reference_max: row.get(4)?,
            status: ResultStatus::from_label(&status),
        })
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}
