use serde::Serialize;

use crate::aggregate::{percentage_or_zero, GroupedReport};
use crate::error::{Error, Result};
use crate::models::{display_date, AttendanceRecord, ReportFormat, ReportMetadata};

pub const INSTITUTION: &str = "sanskruti School, Vidyamanjari Gyanpeeth Campus, Sihor";
pub const REPORT_TITLE: &str = "Attendance Report";
pub const TEMPLATE_BANNER: &str =
    "sanskruti School, Vidyamanjari Gyanpeeth Campus, Sihor, Vidyanagari Gnanbhid Campus-Siddhar";
pub const TEMPLATE_TITLE: &str = "Daily Attendance Report";

/// Paginated-document model shared by every export target. Sections carry
/// their own header row set; the exporters decide page geometry.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub metadata: ReportMetadata,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub heading: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportDocument {
    pub fn body_row_count(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }
}

/// Renderer input: the flat filtered snapshot for summary/detailed, the
/// grouped buckets for the template form.
pub enum RenderInput<'a> {
    Flat(&'a [AttendanceRecord]),
    Grouped(&'a GroupedReport),
}

pub fn render(
    input: RenderInput<'_>,
    format: ReportFormat,
    metadata: &ReportMetadata,
) -> Result<ReportDocument> {
    match (input, format) {
        (RenderInput::Flat(records), ReportFormat::Summary | ReportFormat::Detailed) => {
            Ok(render_flat(records, format, metadata))
        }
        (RenderInput::Grouped(grouped), ReportFormat::Template) => {
            Ok(render_template(grouped, metadata))
        }
        (_, format) => Err(Error::render(format!(
            "renderer input does not match the '{format}' format"
        ))),
    }
}

/// The table layout shown on screen and sent to the print sink. The preview
/// never shows template sections, so Template falls back to the summary
/// columns here.
pub fn visible_format(format: ReportFormat) -> ReportFormat {
    match format {
        ReportFormat::Detailed => ReportFormat::Detailed,
        ReportFormat::Summary | ReportFormat::Template => ReportFormat::Summary,
    }
}

pub fn format_percentage(value: f64) -> String {
    format!("{value:.2}%")
}

/// Summary and detailed layouts: one row per record, in the order received.
/// Callers wanting chronological output pre-sort the input. Detailed adds the
/// roll numbers column immediately before Teacher.
fn render_flat(
    records: &[AttendanceRecord],
    format: ReportFormat,
    metadata: &ReportMetadata,
) -> ReportDocument {
    let detailed = format == ReportFormat::Detailed;
    let mut columns = vec![
        "Date".to_string(),
        "Class".to_string(),
        "Total".to_string(),
        "Present".to_string(),
        "Absent".to_string(),
        "Percentage".to_string(),
    ];
    if detailed {
        columns.push("Absent Roll Numbers".to_string());
    }
    columns.push("Teacher".to_string());

    let rows = records
        .iter()
        .map(|record| {
            let mut row = vec![
                display_date(record.date),
                record.class_id.clone(),
                record.total_students.to_string(),
                record.present_students.to_string(),
                record.absent_students.to_string(),
                format_percentage(percentage_or_zero(record)),
            ];
            if detailed {
                row.push(record.absent_roll_numbers.join(", "));
            }
            row.push(record.teacher_name.clone());
            row
        })
        .collect();

    ReportDocument {
        title: REPORT_TITLE.to_string(),
        metadata: metadata.clone(),
        sections: vec![Section {
            heading: None,
            columns,
            rows,
        }],
    }
}

/// The official paper form: one section per division in grouping order, class
/// columns in first-seen order, six fixed metric rows. Count totals are sums
/// across the section's classes; the percentage total is the unweighted class
/// mean; roll-number and signature cells carry no total.
fn render_template(grouped: &GroupedReport, metadata: &ReportMetadata) -> ReportDocument {
    let mut sections = Vec::with_capacity(grouped.divisions.len());

    for group in &grouped.divisions {
        let mut columns = vec!["#".to_string(), "Details".to_string()];
        for (class_id, _) in &group.classes {
            columns.push(class_id.clone());
        }
        columns.push("Total".to_string());

        let mut present_row = vec!["1".to_string(), "Present Count".to_string()];
        let mut absent_row = vec!["2".to_string(), "Absent Count".to_string()];
        let mut total_row = vec!["3".to_string(), "Total Count".to_string()];
        let mut rolls_row = vec!["4".to_string(), "Absent Roll Numbers".to_string()];
        let mut percent_row = vec!["5".to_string(), "Percentage".to_string()];
        let mut signature_row = vec!["6".to_string(), "Teacher Signature".to_string()];

        for (_, record) in &group.classes {
            present_row.push(record.present_students.to_string());
            absent_row.push(record.absent_students.to_string());
            total_row.push(record.total_students.to_string());
            rolls_row.push(record.absent_roll_numbers.join(", "));
            percent_row.push(format_percentage(percentage_or_zero(record)));
            signature_row.push(String::new());
        }

        let totals = group.totals();
        present_row.push(totals.present.to_string());
        absent_row.push(totals.absent.to_string());
        total_row.push(totals.total.to_string());
        rolls_row.push(String::new());
        percent_row.push(format_percentage(group.mean_percentage()));
        signature_row.push(String::new());

        sections.push(Section {
            heading: Some(group.division.label().to_string()),
            columns,
            rows: vec![
                present_row,
                absent_row,
                total_row,
                rolls_row,
                percent_row,
                signature_row,
            ],
        });
    }

    ReportDocument {
        title: REPORT_TITLE.to_string(),
        metadata: metadata.clone(),
        sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{group_by_division_and_class, DivisionResolution};
    use crate::catalog::SchoolCatalog;
    use crate::models::{
        attendance_percentage, Division, ReportFilter, ReportFormat,
    };
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn record(class_id: &str, total: i32, present: i32) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            class_id: class_id.to_string(),
            total_students: total,
            present_students: present,
            absent_students: total - present,
            absent_roll_numbers: vec!["12".to_string(), "33".to_string()],
            attendance_percentage: Some(attendance_percentage(present, total)),
            teacher_name: "Mr. Sharma".to_string(),
        }
    }

    fn metadata() -> ReportMetadata {
        let filter = ReportFilter {
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            division: None,
            class_id: None,
            format: ReportFormat::Summary,
        };
        ReportMetadata::new(
            &filter,
            &SchoolCatalog::default(),
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        )
    }

    #[test]
    fn summary_row_matches_register_output() {
        let records = vec![record("8-a", 50, 48)];
        let doc = render(RenderInput::Flat(&records), ReportFormat::Summary, &metadata()).unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(
            doc.sections[0].rows[0],
            vec!["6/1/2025", "8-a", "50", "48", "2", "96.00%", "Mr. Sharma"]
        );
    }

    #[test]
    fn detailed_adds_one_column_before_teacher() {
        let records = vec![record("8-a", 50, 48)];
        let summary =
            render(RenderInput::Flat(&records), ReportFormat::Summary, &metadata()).unwrap();
        let detailed =
            render(RenderInput::Flat(&records), ReportFormat::Detailed, &metadata()).unwrap();

        let summary_cols = &summary.sections[0].columns;
        let detailed_cols = &detailed.sections[0].columns;
        assert_eq!(detailed_cols.len(), summary_cols.len() + 1);
        assert_eq!(
            detailed_cols[detailed_cols.len() - 2],
            "Absent Roll Numbers"
        );
        assert_eq!(detailed_cols.last().unwrap(), "Teacher");
        assert_eq!(detailed.sections[0].rows[0][6], "12, 33");
    }

    #[test]
    fn flat_rows_round_trip_record_count() {
        let records = vec![record("8-a", 50, 48), record("3-a", 42, 40)];
        let doc = render(RenderInput::Flat(&records), ReportFormat::Summary, &metadata()).unwrap();
        assert_eq!(doc.body_row_count(), records.len());
    }

    #[test]
    fn rows_keep_input_order() {
        let records = vec![record("3-a", 42, 40), record("8-a", 50, 48)];
        let doc = render(RenderInput::Flat(&records), ReportFormat::Summary, &metadata()).unwrap();
        assert_eq!(doc.sections[0].rows[0][1], "3-a");
        assert_eq!(doc.sections[0].rows[1][1], "8-a");
    }

    #[test]
    fn template_section_has_six_metric_rows_and_class_columns() {
        let catalog = SchoolCatalog::default();
        let records = vec![record("8-a", 50, 48), record("7-a", 40, 30)];
        let grouped =
            group_by_division_and_class(&records, &catalog, DivisionResolution::RecordClass);
        let doc =
            render(RenderInput::Grouped(&grouped), ReportFormat::Template, &metadata()).unwrap();

        assert_eq!(doc.sections.len(), 1);
        let section = &doc.sections[0];
        assert_eq!(section.heading.as_deref(), Some("Middle (6-10)"));
        assert_eq!(section.columns, vec!["#", "Details", "8-a", "7-a", "Total"]);
        assert_eq!(section.rows.len(), 6);

        // Count totals are sums across the section's classes.
        assert_eq!(section.rows[0], vec!["1", "Present Count", "48", "30", "78"]);
        assert_eq!(section.rows[1], vec!["2", "Absent Count", "2", "10", "12"]);
        assert_eq!(section.rows[2], vec!["3", "Total Count", "50", "40", "90"]);
        // Roll numbers and signature carry no total.
        assert_eq!(section.rows[3].last().unwrap(), "");
        assert!(section.rows[5][2..].iter().all(|cell| cell.is_empty()));
    }

    #[test]
    fn template_percentage_total_is_unweighted_mean() {
        let catalog = SchoolCatalog::default();
        let mut first = record("6-a", 10, 9);
        first.attendance_percentage = Some(90.0);
        let mut second = record("7-a", 1000, 800);
        second.attendance_percentage = Some(80.0);
        let grouped = group_by_division_and_class(
            &[first, second],
            &catalog,
            DivisionResolution::RecordClass,
        );
        let doc =
            render(RenderInput::Grouped(&grouped), ReportFormat::Template, &metadata()).unwrap();
        let percent_row = &doc.sections[0].rows[4];
        assert_eq!(percent_row.last().unwrap(), "85.00%");
    }

    #[test]
    fn template_sections_follow_grouping_order() {
        let catalog = SchoolCatalog::default();
        let records = vec![record("11-sci", 38, 35), record("3-a", 42, 40)];
        let grouped =
            group_by_division_and_class(&records, &catalog, DivisionResolution::RecordClass);
        let doc =
            render(RenderInput::Grouped(&grouped), ReportFormat::Template, &metadata()).unwrap();
        let headings: Vec<&str> = doc
            .sections
            .iter()
            .filter_map(|s| s.heading.as_deref())
            .collect();
        assert_eq!(headings, vec![Division::Secondary.label(), Division::Primary.label()]);
    }

    #[test]
    fn missing_percentage_renders_as_zero() {
        let mut degraded = record("8-a", 50, 48);
        degraded.attendance_percentage = None;
        let records = vec![degraded];
        let doc = render(RenderInput::Flat(&records), ReportFormat::Summary, &metadata()).unwrap();
        assert_eq!(doc.sections[0].rows[0][5], "0.00%");
    }

    #[test]
    fn empty_input_yields_headers_only_document() {
        let doc = render(RenderInput::Flat(&[]), ReportFormat::Summary, &metadata()).unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert!(!doc.sections[0].columns.is_empty());
        assert!(doc.sections[0].rows.is_empty());

        let grouped = GroupedReport::default();
        let doc =
            render(RenderInput::Grouped(&grouped), ReportFormat::Template, &metadata()).unwrap();
        assert!(doc.sections.is_empty());
    }

    #[test]
    fn mismatched_input_is_a_render_error() {
        let records = vec![record("8-a", 50, 48)];
        let err = render(RenderInput::Flat(&records), ReportFormat::Template, &metadata())
            .unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }

    #[test]
    fn visible_format_never_shows_template_sections() {
        assert_eq!(visible_format(ReportFormat::Template), ReportFormat::Summary);
        assert_eq!(visible_format(ReportFormat::Detailed), ReportFormat::Detailed);
    }

    #[test]
    fn document_serializes_for_json_export() {
        let records = vec![record("8-a", 50, 48)];
        let doc = render(RenderInput::Flat(&records), ReportFormat::Summary, &metadata()).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["sections"][0]["rows"][0][5], "96.00%");
    }
}
