use std::fmt::Write;

use crate::render::{ReportDocument, INSTITUTION};

/// Builds the self-contained print page for a report.
///
/// Deliberate asymmetry with the PDF sink: PDF export always includes every
/// section of the document, while the print flow only ever receives the table
/// currently on screen — callers render with [`crate::render::visible_format`]
/// and hand the flat document here. Only the document's first section is
/// embedded; do not "fix" this by looping over sections.
pub fn page(document: &ReportDocument) -> String {
    let mut html = String::new();

    let _ = writeln!(html, "<html>");
    let _ = writeln!(html, "  <head>");
    let _ = writeln!(html, "    <title>{}</title>", escape(&document.title));
    let _ = writeln!(html, "    <style>");
    let _ = writeln!(
        html,
        "      body {{ font-family: Arial, sans-serif; margin: 20px; }}"
    );
    let _ = writeln!(html, "      h1, h2 {{ text-align: center; }}");
    let _ = writeln!(
        html,
        "      table {{ width: 100%; border-collapse: collapse; margin: 20px 0; }}"
    );
    let _ = writeln!(
        html,
        "      th, td {{ border: 1px solid #ddd; padding: 8px; text-align: center; }}"
    );
    let _ = writeln!(
        html,
        "      th {{ background-color: #1e3a8a; color: white; }}"
    );
    let _ = writeln!(html, "      .metadata {{ margin-bottom: 20px; }}");
    let _ = writeln!(html, "      .metadata p {{ margin: 5px 0; }}");
    let _ = writeln!(html, "    </style>");
    let _ = writeln!(html, "  </head>");
    let _ = writeln!(html, "  <body>");
    let _ = writeln!(html, "    <h1>{}</h1>", escape(INSTITUTION));
    let _ = writeln!(html, "    <h2>{}</h2>", escape(&document.title));
    let _ = writeln!(html, "    <div class=\"metadata\">");
    for line in [
        &document.metadata.date_range_label,
        &document.metadata.division_label,
        &document.metadata.class_label,
        &document.metadata.generated_on_label,
    ] {
        let _ = writeln!(html, "      <p>{}</p>", escape(line));
    }
    let _ = writeln!(html, "    </div>");

    if let Some(section) = document.sections.first() {
        let _ = writeln!(html, "    <table>");
        let _ = writeln!(html, "      <thead>");
        let _ = writeln!(html, "        <tr>");
        for column in &section.columns {
            let _ = writeln!(html, "          <th>{}</th>", escape(column));
        }
        let _ = writeln!(html, "        </tr>");
        let _ = writeln!(html, "      </thead>");
        let _ = writeln!(html, "      <tbody>");
        for row in &section.rows {
            let _ = writeln!(html, "        <tr>");
            for cell in row {
                let _ = writeln!(html, "          <td>{}</td>", escape(cell));
            }
            let _ = writeln!(html, "        </tr>");
        }
        let _ = writeln!(html, "      </tbody>");
        let _ = writeln!(html, "    </table>");
    }

    // The platform print flow: open, print, close shortly after.
    let _ = writeln!(html, "    <script>");
    let _ = writeln!(html, "      window.onload = function() {{");
    let _ = writeln!(html, "        window.print();");
    let _ = writeln!(html, "        window.setTimeout(function() {{");
    let _ = writeln!(html, "          window.close();");
    let _ = writeln!(html, "        }}, 500);");
    let _ = writeln!(html, "      }}");
    let _ = writeln!(html, "    </script>");
    let _ = writeln!(html, "  </body>");
    let _ = writeln!(html, "</html>");

    html
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchoolCatalog;
    use crate::models::{
        attendance_percentage, AttendanceRecord, ReportFilter, ReportFormat, ReportMetadata,
    };
    use crate::render::{render, visible_format, RenderInput};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn record(class_id: &str, teacher: &str) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            class_id: class_id.to_string(),
            total_students: 50,
            present_students: 48,
            absent_students: 2,
            absent_roll_numbers: vec!["12".to_string()],
            attendance_percentage: Some(attendance_percentage(48, 50)),
            teacher_name: teacher.to_string(),
        }
    }

    fn document(records: &[AttendanceRecord], format: ReportFormat) -> ReportDocument {
        let filter = ReportFilter {
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            division: None,
            class_id: None,
            format,
        };
        let metadata = ReportMetadata::new(
            &filter,
            &SchoolCatalog::default(),
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        );
        render(RenderInput::Flat(records), visible_format(format), &metadata).unwrap()
    }

    #[test]
    fn page_embeds_exactly_one_table() {
        let records = vec![record("8-a", "Mr. Sharma"), record("3-a", "Mrs. Trivedi")];
        let html = page(&document(&records, ReportFormat::Summary));
        assert_eq!(html.matches("<table>").count(), 1);
        assert_eq!(html.matches("<tr>").count(), 1 + records.len());
    }

    #[test]
    fn template_request_prints_the_visible_summary_table() {
        let records = vec![record("8-a", "Mr. Sharma")];
        let html = page(&document(&records, ReportFormat::Template));
        // No template sections in print output, just the flat table.
        assert!(html.contains("<th>Percentage</th>"));
        assert!(!html.contains("Teacher Signature"));
    }

    #[test]
    fn page_carries_header_block_and_print_script() {
        let records = vec![record("8-a", "Mr. Sharma")];
        let html = page(&document(&records, ReportFormat::Summary));
        assert!(html.contains(INSTITUTION));
        assert!(html.contains("Period: 6/1/2025 to 6/30/2025"));
        assert!(html.contains("window.print()"));
        assert!(html.contains("window.close()"));
    }

    #[test]
    fn cells_are_html_escaped() {
        let records = vec![record("8-a", "Mr. <Sharma> & Co")];
        let html = page(&document(&records, ReportFormat::Summary));
        assert!(html.contains("Mr. &lt;Sharma&gt; &amp; Co"));
        assert!(!html.contains("<Sharma>"));
    }

    #[test]
    fn empty_document_still_renders_headers() {
        let html = page(&document(&[], ReportFormat::Summary));
        assert!(html.contains("<th>Date</th>"));
        assert_eq!(html.matches("<td>").count(), 0);
    }
}
