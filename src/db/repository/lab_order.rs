use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{DatabaseError, TIMESTAMP_FORMAT};
use crate::models::*;

const ORDER_COLUMNS: &str = "id, recorded_at, patient_age, patient_gender, triage_category, diagnosis,
         comorbidities, vital_signs, symptom_duration, pain_scale, additional_notes,
         laboratory_values, reasoning, estimated_duration, urgency_level, cost_efficiency,
         quality_check, session_id";

/// Insert a case and its outcome. Returns the new monotonically increasing id.
pub fn insert_lab_order(
    conn: &Connection,
    case: &PatientCase,
    outcome: &LabOutcome,
    recorded_at: &NaiveDateTime,
    session_id: &str,
) -> Result<CaseId, DatabaseError> {
    conn.execute(
        "INSERT INTO laboratory_orders (recorded_at, patient_age, patient_gender, triage_category,
         diagnosis, comorbidities, vital_signs, symptom_duration, pain_scale, additional_notes,
         laboratory_values, reasoning, estimated_duration, urgency_level, cost_efficiency,
         quality_check, session_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            recorded_at.format(TIMESTAMP_FORMAT).to_string(),
            case.age,
            case.gender.as_str(),
            case.triage_category.as_str(),
            case.suspected_diagnosis,
            serde_json::to_string(&case.comorbidities)?,
            serde_json::to_string(&case.vital_signs)?,
            case.symptom_duration.as_str(),
            case.pain_scale,
            case.notes,
            serde_json::to_string(&outcome.laboratory_tests)?,
            outcome.reasoning,
            outcome.estimated_duration,
            outcome.urgency_level,
            outcome.cost_efficiency,
            outcome.quality_check,
            session_id,
        ],
    )?;
    Ok(CaseId(conn.last_insert_rowid()))
}

pub fn get_lab_order(conn: &Connection, id: CaseId) -> Result<Option<CaseRecord>, DatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM laboratory_orders WHERE id = ?1");
    let record = conn
        .query_row(&sql, params![id.0], |row| row_to_case_record(row, 0))
        .optional()?;
    Ok(record)
}

/// Every order, in insertion order.
pub fn get_all_lab_orders(conn: &Connection) -> Result<Vec<CaseRecord>, DatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM laboratory_orders ORDER BY id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| row_to_case_record(row, 0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Orders recorded at or after `since`, oldest first.
pub fn get_lab_orders_since(
    conn: &Connection,
    since: &NaiveDateTime,
) -> Result<Vec<CaseRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM laboratory_orders
         WHERE recorded_at >= ?1 ORDER BY recorded_at ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![since.format(TIMESTAMP_FORMAT).to_string()],
        |row| row_to_case_record(row, 0),
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Most recent orders, newest first.
pub fn get_recent_lab_orders(conn: &Connection, limit: u32) -> Result<Vec<CaseRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM laboratory_orders ORDER BY recorded_at DESC, id DESC LIMIT ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit], |row| row_to_case_record(row, 0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn count_lab_orders(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM laboratory_orders", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Map an order row whose columns start at `offset` (ORDER_COLUMNS order).
pub(crate) fn row_to_case_record(
    row: &rusqlite::Row<'_>,
    offset: usize,
) -> Result<CaseRecord, rusqlite::Error> {
    let recorded_str: String = row.get(offset + 1)?;
    let gender: String = row.get(offset + 3)?;
    let triage: String = row.get(offset + 4)?;
    let duration: String = row.get(offset + 8)?;

    let case = PatientCase {
        age: row.get(offset + 2)?,
        gender: Gender::from_label(&gender),
        triage_category: TriageCategory::from_label(&triage),
        suspected_diagnosis: row.get(offset + 5)?,
        comorbidities: json_column(row, offset + 6)?,
        symptom_duration: SymptomDuration::from_label(&duration),
        pain_scale: row.get(offset + 9)?,
        notes: row.get(offset + 10)?,
        vital_signs: json_column(row, offset + 7)?,
    };

    let outcome = LabOutcome {
        laboratory_tests: json_column(row, offset + 11)?,
        reasoning: row.get(offset + 12)?,
        estimated_duration: row.get(offset + 13)?,
        urgency_level: row.get(offset + 14)?,
        cost_efficiency: row.get(offset + 15)?,
        quality_check: row.get(offset + 16)?,
    };

    Ok(CaseRecord {
        id: CaseId(row.get(offset)?),
        recorded_at: NaiveDateTime::parse_from_str(&recorded_str, TIMESTAMP_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(offset + 1, Type::Text, Box::new(e))
        })?,
        session_id: row.get(offset + 17)?,
        case,
        outcome,
    })
}

/// Decode a JSON TEXT column.
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> Result<T, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn make_case(diagnosis: &str, age: u32) -> PatientCase {
        PatientCase {
            age,
            gender: Gender::Female,
            triage_category: TriageCategory::Yellow,
            suspected_diagnosis: diagnosis.into(),
            comorbidities: vec!["COPD".into(), "Asthma".into()],
            symptom_duration: SymptomDuration::OneToThreeDays,
            pain_scale: 4,
            notes: "Productive cough".into(),
            vital_signs: VitalSigns {
                systolic_bp: 145.0,
                diastolic_bp: 90.0,
                heart_rate: 105.0,
                temperature: 39.1,
                respiratory_rate: 24.0,
                oxygen_saturation: 92.0,
            },
        }
    }

    fn make_outcome(tests: &[&str], cost_efficiency: u8) -> LabOutcome {
        LabOutcome {
            laboratory_tests: tests.iter().map(|t| t.to_string()).collect(),
            reasoning: "Inflammation markers".into(),
            estimated_duration: "2-4".into(),
            urgency_level: "high".into(),
            cost_efficiency,
            quality_check: "Guideline compliant".into(),
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = test_db();
        let case = make_case("Pneumonia", 65);
        let outcome = make_outcome(&["CRP", "PCT", "Leukocytes"], 5);
        let recorded = at("2026-03-01 08:30:00");

        let id = insert_lab_order(&conn, &case, &outcome, &recorded, "session-1").unwrap();
        let record = get_lab_order(&conn, id).unwrap().unwrap();

        assert_eq!(record.id, id);
        assert_eq!(record.case, case);
        assert_eq!(record.outcome, outcome);
        assert_eq!(record.recorded_at, recorded);
        assert_eq!(record.session_id, "session-1");
    }

    #[test]
    fn ids_increase_monotonically() {
        let conn = test_db();
        let recorded = at("2026-03-01 08:30:00");
        let first = insert_lab_order(&conn, &make_case("A", 30), &make_outcome(&[], 3), &recorded, "s").unwrap();
        let second = insert_lab_order(&conn, &make_case("B", 40), &make_outcome(&[], 3), &recorded, "s").unwrap();
        assert!(second > first);
    }

    #[test]
    fn missing_order_returns_none() {
        let conn = test_db();
        assert!(get_lab_order(&conn, CaseId(42)).unwrap().is_none());
    }

    #[test]
    fn orders_since_filters_and_sorts_ascending() {
        let conn = test_db();
        let outcome = make_outcome(&["CRP"], 4);
        insert_lab_order(&conn, &make_case("Old", 50), &outcome, &at("2026-01-01 10:00:00"), "s").unwrap();
        insert_lab_order(&conn, &make_case("Later", 50), &outcome, &at("2026-03-05 10:00:00"), "s").unwrap();
        insert_lab_order(&conn, &make_case("Earlier", 50), &outcome, &at("2026-03-02 10:00:00"), "s").unwrap();

        let records = get_lab_orders_since(&conn, &at("2026-03-01 00:00:00")).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.case.suspected_diagnosis.as_str()).collect();
        assert_eq!(names, vec!["Earlier", "Later"]);
    }

    #[test]
    fn recent_orders_newest_first_with_limit() {
        let conn = test_db();
        let outcome = make_outcome(&[], 3);
        for (i, ts) in ["2026-03-01 10:00:00", "2026-03-02 10:00:00", "2026-03-03 10:00:00"]
            .iter()
            .enumerate()
        {
            insert_lab_order(&conn, &make_case(&format!("Case {i}"), 30), &outcome, &at(ts), "s").unwrap();
        }

        let all = get_all_lab_orders(&conn).unwrap();
        assert_eq!(all.first().unwrap().case.suspected_diagnosis, "Case 0");

        let recent = get_recent_lab_orders(&conn, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].case.suspected_diagnosis, "Case 2");
        assert_eq!(recent[1].case.suspected_diagnosis, "Case 1");
        assert_eq!(count_lab_orders(&conn).unwrap(), 3);
    }

    #[test]
    fn cost_efficiency_out_of_range_violates_check() {
        let conn = test_db();
        let result = insert_lab_order(
            &conn,
            &make_case("X", 30),
            &make_outcome(&[], 9),
            &at("2026-03-01 10:00:00"),
            "s",
        );
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
    }
}
