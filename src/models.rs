use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::ClassCatalog;
use crate::error::{Error, Result};

/// Schooling-stage grouping of classes, displayed with the official labels
/// used on the institution's paper forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Division {
    #[serde(rename = "Pre-School")]
    PreSchool,
    #[serde(rename = "Primary (1-5)")]
    Primary,
    #[serde(rename = "Middle (6-10)")]
    Middle,
    #[serde(rename = "Middle (6-10 General)")]
    MiddleGeneral,
    #[serde(rename = "Secondary (11-12)")]
    Secondary,
}

impl Division {
    pub const ALL: [Division; 5] = [
        Division::PreSchool,
        Division::Primary,
        Division::Middle,
        Division::MiddleGeneral,
        Division::Secondary,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Division::PreSchool => "Pre-School",
            Division::Primary => "Primary (1-5)",
            Division::Middle => "Middle (6-10)",
            Division::MiddleGeneral => "Middle (6-10 General)",
            Division::Secondary => "Secondary (11-12)",
        }
    }

    fn slug(&self) -> &'static str {
        match self {
            Division::PreSchool => "pre-school",
            Division::Primary => "primary",
            Division::Middle => "middle",
            Division::MiddleGeneral => "middle-general",
            Division::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Division {
    type Err = String;

    /// Accepts either the official label or the kebab slug used on the CLI.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Division::ALL
            .iter()
            .find(|d| d.label().eq_ignore_ascii_case(wanted) || d.slug() == wanted.to_lowercase())
            .copied()
            .ok_or_else(|| format!("unknown division '{wanted}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Department {
    General,
    Star,
    Science,
    Commerce,
    Arts,
}

/// Reference-data entry for one class roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassInfo {
    pub id: String,
    pub name: String,
    pub division: Division,
    pub department: Option<Department>,
}

/// One finalized attendance row for a class on a date.
///
/// The pipeline treats these as immutable input: derived fields are computed
/// at capture time and carried along, never recomputed downstream. The stored
/// percentage is nullable because historical rows have arrived without one;
/// rendering degrades those to zero with a warning instead of failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub date: NaiveDate,
    pub class_id: String,
    pub total_students: i32,
    pub present_students: i32,
    pub absent_students: i32,
    pub absent_roll_numbers: Vec<String>,
    pub attendance_percentage: Option<f64>,
    pub teacher_name: String,
}

/// Attendance submission as it comes off the entry form, before the derived
/// fields exist.
#[derive(Debug, Clone)]
pub struct AttendanceEntry {
    pub date: NaiveDate,
    pub class_id: String,
    pub total_students: i32,
    pub present_students: i32,
    pub absent_roll_numbers: Vec<String>,
    pub teacher_name: String,
}

impl AttendanceEntry {
    /// Validates the submission and computes the derived fields, producing a
    /// record ready for the store. Rejections never reach aggregation.
    pub fn finalize(self, catalog: &dyn ClassCatalog) -> Result<AttendanceRecord> {
        if catalog.resolve_class(&self.class_id).is_none() {
            return Err(Error::validation(format!(
                "unknown class id '{}'",
                self.class_id
            )));
        }
        if self.total_students < 0 {
            return Err(Error::validation("total students cannot be negative"));
        }
        if self.present_students < 0 {
            return Err(Error::validation("present students cannot be negative"));
        }
        if self.present_students > self.total_students {
            return Err(Error::validation(
                "present students cannot exceed total students",
            ));
        }
        if self.teacher_name.trim().is_empty() {
            return Err(Error::validation("teacher name is required"));
        }

        let percentage = attendance_percentage(self.present_students, self.total_students);
        Ok(AttendanceRecord {
            id: Uuid::new_v4(),
            date: self.date,
            absent_students: self.total_students - self.present_students,
            class_id: self.class_id,
            total_students: self.total_students,
            present_students: self.present_students,
            absent_roll_numbers: self.absent_roll_numbers,
            attendance_percentage: Some(percentage),
            teacher_name: self.teacher_name,
        })
    }
}

/// Capture-time percentage rule: 100 * present / total rounded to two
/// decimals, zero for an empty roster.
pub fn attendance_percentage(present: i32, total: i32) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (10000.0 * present as f64 / total as f64).round() / 100.0
}

/// Splits a comma-separated roll number field into trimmed entries.
pub fn parse_roll_numbers(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|roll| roll.trim().to_string())
        .filter(|roll| !roll.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Summary,
    Detailed,
    Template,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportFormat::Summary => "summary",
            ReportFormat::Detailed => "detailed",
            ReportFormat::Template => "template",
        };
        f.write_str(name)
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "summary" => Ok(ReportFormat::Summary),
            "detailed" => Ok(ReportFormat::Detailed),
            "template" => Ok(ReportFormat::Template),
            other => Err(format!("unknown report format '{other}'")),
        }
    }
}

/// Filter set for one report request. The date range is applied at the store
/// boundary; division and class narrow the fetched snapshot in the engine.
#[derive(Debug, Clone)]
pub struct ReportFilter {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub division: Option<Division>,
    pub class_id: Option<String>,
    pub format: ReportFormat,
}

impl ReportFilter {
    pub fn validate(&self, catalog: &dyn ClassCatalog) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(Error::validation("start date must not be after end date"));
        }
        if let Some(class_id) = &self.class_id {
            let info = catalog
                .resolve_class(class_id)
                .ok_or_else(|| Error::validation(format!("unknown class id '{class_id}'")))?;
            if let Some(division) = self.division {
                if info.division != division {
                    return Err(Error::validation(format!(
                        "class '{}' does not belong to division '{}'",
                        class_id, division
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Header-block labels, precomputed by the caller so the renderer and both
/// exporters print identical metadata lines.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub date_range_label: String,
    pub division_label: String,
    pub class_label: String,
    pub generated_on_label: String,
}

impl ReportMetadata {
    pub fn new(filter: &ReportFilter, catalog: &dyn ClassCatalog, generated_on: NaiveDate) -> Self {
        let class_label = match &filter.class_id {
            Some(class_id) => {
                let name = catalog
                    .resolve_class(class_id)
                    .map(|info| info.name.clone())
                    .unwrap_or_else(|| class_id.clone());
                format!("Class: {name}")
            }
            None => "All Classes".to_string(),
        };
        ReportMetadata {
            date_range_label: format!(
                "Period: {} to {}",
                display_date(filter.start_date),
                display_date(filter.end_date)
            ),
            division_label: match filter.division {
                Some(division) => format!("Division: {division}"),
                None => "All Divisions".to_string(),
            },
            class_label,
            generated_on_label: format!("Generated on: {}", display_date(generated_on)),
        }
    }
}

/// Dates render the way the register always has: `6/1/2025`, no zero padding.
pub fn display_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}
