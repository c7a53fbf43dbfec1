use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::catalog::ClassCatalog;
use crate::error::{Error, Result};
use crate::models::{parse_roll_numbers, AttendanceEntry, AttendanceRecord};

/// Abstract attendance record source.
///
/// The pipeline only ever reads a snapshot through this trait; date filtering
/// happens here (inclusive of both range ends), never in the engine. Mutations
/// confirm before callers update any local view.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn fetch_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>>;
    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>>;
    async fn fetch_by_id(&self, id: Uuid) -> Result<AttendanceRecord>;
    async fn create(&self, record: AttendanceRecord) -> Result<()>;
    async fn update(&self, record: AttendanceRecord) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed store. One row per class per day; a re-submission for the
/// same class and date overwrites the earlier row.
pub struct PgAttendanceStore {
    pool: PgPool,
}

impl PgAttendanceStore {
    pub fn new(pool: PgPool) -> Self {
        PgAttendanceStore { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, class_id, taken_on, total_students, present_students, \
     absent_students, absent_roll_numbers, attendance_percentage, teacher_name \
     FROM attendance_register.daily_attendance";

fn record_from_row(row: &sqlx::postgres::PgRow) -> AttendanceRecord {
    AttendanceRecord {
        id: row.get("id"),
        date: row.get("taken_on"),
        class_id: row.get("class_id"),
        total_students: row.get("total_students"),
        present_students: row.get("present_students"),
        absent_students: row.get("absent_students"),
        absent_roll_numbers: row.get("absent_roll_numbers"),
        attendance_percentage: row.get("attendance_percentage"),
        teacher_name: row.get("teacher_name"),
    }
}

#[async_trait]
impl AttendanceStore for PgAttendanceStore {
    async fn fetch_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        let query = format!(
            "{SELECT_COLUMNS} WHERE taken_on >= $1 AND taken_on <= $2 ORDER BY taken_on, class_id"
        );
        let rows = sqlx::query(&query)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let query = format!("{SELECT_COLUMNS} WHERE taken_on = $1 ORDER BY class_id");
        let rows = sqlx::query(&query).bind(date).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn fetch_by_id(&self, id: Uuid) -> Result<AttendanceRecord> {
        let query = format!("{SELECT_COLUMNS} WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| record_from_row(&row))
            .ok_or_else(|| Error::not_found("attendance record", id.to_string()))
    }

    async fn create(&self, record: AttendanceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attendance_register.daily_attendance
            (id, class_id, taken_on, total_students, present_students,
             absent_students, absent_roll_numbers, attendance_percentage, teacher_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (class_id, taken_on) DO UPDATE
            SET total_students = EXCLUDED.total_students,
                present_students = EXCLUDED.present_students,
                absent_students = EXCLUDED.absent_students,
                absent_roll_numbers = EXCLUDED.absent_roll_numbers,
                attendance_percentage = EXCLUDED.attendance_percentage,
                teacher_name = EXCLUDED.teacher_name
            "#,
        )
        .bind(record.id)
        .bind(&record.class_id)
        .bind(record.date)
        .bind(record.total_students)
        .bind(record.present_students)
        .bind(record.absent_students)
        .bind(&record.absent_roll_numbers)
        .bind(record.attendance_percentage)
        .bind(&record.teacher_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, record: AttendanceRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE attendance_register.daily_attendance
            SET class_id = $2, taken_on = $3, total_students = $4, present_students = $5,
                absent_students = $6, absent_roll_numbers = $7,
                attendance_percentage = $8, teacher_name = $9
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.class_id)
        .bind(record.date)
        .bind(record.total_students)
        .bind(record.present_students)
        .bind(record.absent_students)
        .bind(&record.absent_roll_numbers)
        .bind(record.attendance_percentage)
        .bind(&record.teacher_name)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("attendance record", record.id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM attendance_register.daily_attendance WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("attendance record", id.to_string()));
        }
        Ok(())
    }
}

/// In-memory store for tests and local development.
pub struct MemoryStore {
    records: Mutex<Vec<AttendanceRecord>>,
}

impl MemoryStore {
    pub fn new(records: Vec<AttendanceRecord>) -> Self {
        MemoryStore {
            records: Mutex::new(records),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new(Vec::new())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn fetch_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        let records = self.records.lock().expect("store lock poisoned");
        Ok(records
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect())
    }

    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        self.fetch_by_date_range(date, date).await
    }

    async fn fetch_by_id(&self, id: Uuid) -> Result<AttendanceRecord> {
        let records = self.records.lock().expect("store lock poisoned");
        records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("attendance record", id.to_string()))
    }

    async fn create(&self, record: AttendanceRecord) -> Result<()> {
        let mut records = self.records.lock().expect("store lock poisoned");
        records.retain(|r| !(r.class_id == record.class_id && r.date == record.date));
        records.push(record);
        Ok(())
    }

    async fn update(&self, record: AttendanceRecord) -> Result<()> {
        let mut records = self.records.lock().expect("store lock poisoned");
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(Error::not_found("attendance record", record.id.to_string())),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut records = self.records.lock().expect("store lock poisoned");
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(Error::not_found("attendance record", id.to_string()));
        }
        Ok(())
    }
}

/// Realistic rows covering every division, two consecutive school days.
pub async fn seed(store: &dyn AttendanceStore, catalog: &dyn ClassCatalog) -> Result<usize> {
    let rows = vec![
        ("2025-06-01", "nursery", 28, 26, "4, 17", "Ms. Desai"),
        ("2025-06-01", "3-a", 42, 40, "9, 21", "Mrs. Trivedi"),
        ("2025-06-01", "8-a", 50, 48, "12, 33", "Mr. Sharma"),
        ("2025-06-01", "8-b", 45, 36, "2, 5, 8, 11, 19, 23, 27, 31, 40", "Mr. Vyas"),
        ("2025-06-01", "11-sci", 38, 35, "6, 14, 30", "Dr. Mehta"),
        ("2025-06-02", "nursery", 28, 27, "17", "Ms. Desai"),
        ("2025-06-02", "3-a", 42, 41, "21", "Mrs. Trivedi"),
        ("2025-06-02", "8-a", 50, 49, "33", "Mr. Sharma"),
        ("2025-06-02", "8-b", 45, 40, "5, 11, 23, 31, 40", "Mr. Vyas"),
        ("2025-06-02", "11-sci", 38, 36, "14, 30", "Dr. Mehta"),
    ];

    let mut inserted = 0usize;
    for (date, class_id, total, present, rolls, teacher) in rows {
        let date = date
            .parse::<NaiveDate>()
            .map_err(|e| Error::validation(format!("bad seed date: {e}")))?;
        let record = AttendanceEntry {
            date,
            class_id: class_id.to_string(),
            total_students: total,
            present_students: present,
            absent_roll_numbers: parse_roll_numbers(rolls),
            teacher_name: teacher.to_string(),
        }
        .finalize(catalog)?;
        store.create(record).await?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Bulk import of attendance rows from a CSV file. Each row is validated and
/// finalized exactly like a form submission; the first bad row aborts the
/// import with its line number.
pub async fn import_csv(
    store: &dyn AttendanceStore,
    catalog: &dyn ClassCatalog,
    csv_path: &Path,
) -> Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        date: NaiveDate,
        class_id: String,
        total_students: i32,
        present_students: i32,
        absent_roll_numbers: String,
        teacher_name: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .map_err(|e| Error::validation(format!("cannot open csv: {e}")))?;
    let mut inserted = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row =
            result.map_err(|e| Error::validation(format!("csv row {}: {e}", index + 1)))?;
        let record = AttendanceEntry {
            date: row.date,
            class_id: row.class_id,
            total_students: row.total_students,
            present_students: row.present_students,
            absent_roll_numbers: parse_roll_numbers(&row.absent_roll_numbers),
            teacher_name: row.teacher_name,
        }
        .finalize(catalog)
        .map_err(|e| Error::validation(format!("csv row {}: {e}", index + 1)))?;

        store.create(record).await?;
        inserted += 1;
    }

    Ok(inserted)
}
