use chrono::NaiveDate;
use serde::Serialize;

use crate::models::AttendanceRecord;

/// One day's dashboard summary.
///
/// The average here is student-weighted (total present over total enrolled),
/// unlike the template form's unweighted per-class mean; the two must not be
/// conflated.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub date: NaiveDate,
    pub total_students: i64,
    pub present_students: i64,
    pub average_attendance: f64,
    pub class_count: usize,
    pub class_wise: Vec<AttendanceRecord>,
}

pub fn for_day(date: NaiveDate, records: Vec<AttendanceRecord>) -> DashboardStats {
    let total_students: i64 = records.iter().map(|r| r.total_students as i64).sum();
    let present_students: i64 = records.iter().map(|r| r.present_students as i64).sum();
    let average_attendance = if total_students > 0 {
        100.0 * present_students as f64 / total_students as f64
    } else {
        0.0
    };

    DashboardStats {
        date,
        total_students,
        present_students,
        average_attendance,
        class_count: records.len(),
        class_wise: records,
    }
}
