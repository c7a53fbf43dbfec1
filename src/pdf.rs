use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};

use crate::error::{Error, Result};
use crate::models::{display_date, ReportFormat};
use crate::render::{ReportDocument, Section, INSTITUTION, TEMPLATE_BANNER, TEMPLATE_TITLE};

/// Every PDF artifact the register produces carries this name.
pub const DEFAULT_FILENAME: &str = "Attendance_Report.pdf";

const PAGE_WIDTH: f64 = 210.0;
const PAGE_HEIGHT: f64 = 297.0;
const MARGIN: f64 = 15.0;
const BOTTOM_MARGIN: f64 = 20.0;
const ROW_HEIGHT: f64 = 7.0;
const TABLE_GAP: f64 = 10.0;

// Approximate Helvetica advance: ~0.5 em per character, 1 pt = 0.3528 mm.
const CHAR_WIDTH_FACTOR: f64 = 0.5 * 0.3528;

/// Renders the whole document — every section, unlike the print sink — into a
/// multi-page A4 PDF: fixed header block, then one bordered grid table per
/// section, each stacked below the previous table's end plus a fixed gap.
/// Pagination lives here, not in the renderer.
pub fn export(
    document: &ReportDocument,
    format: ReportFormat,
    generated_on: NaiveDate,
) -> Result<Vec<u8>> {
    let mut writer = PdfWriter::new(&document.title)?;

    writer.centered_text(INSTITUTION, 16.0, true);
    writer.advance(10.0);
    writer.centered_text(&document.title, 13.0, false);
    writer.advance(10.0);

    for line in [
        document.metadata.date_range_label.as_str(),
        document.metadata.division_label.as_str(),
        document.metadata.class_label.as_str(),
        document.metadata.generated_on_label.as_str(),
    ] {
        writer.text(line, 9.0, MARGIN, false);
        writer.advance(5.0);
    }
    writer.advance(5.0);

    if format == ReportFormat::Template {
        writer.centered_text(TEMPLATE_BANNER, 11.0, true);
        writer.advance(8.0);
        writer.centered_text(TEMPLATE_TITLE, 13.0, false);
        writer.advance(8.0);
        let year = generated_on.year();
        writer.text(&format!("Academic Year: {}/{}", year, year + 1), 10.0, 20.0, false);
        writer.text(&format!("Date: {}", display_date(generated_on)), 10.0, 150.0, false);
        writer.advance(10.0);
    }

    let template = format == ReportFormat::Template;
    for section in &document.sections {
        writer.table(section, template);
        writer.advance(TABLE_GAP);
    }

    writer.finish()
}

/// Writes the document to `path` (callers default to [`DEFAULT_FILENAME`]).
pub fn export_to_file(
    document: &ReportDocument,
    format: ReportFormat,
    generated_on: NaiveDate,
    path: &Path,
) -> Result<()> {
    let bytes = export(document, format, generated_on)?;
    std::fs::write(path, bytes).map_err(|e| Error::render(format!("cannot write pdf: {e}")))?;
    Ok(())
}

struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    /// Distance from the top edge of the current page, in millimetres.
    y: f64,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| Error::render(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| Error::render(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(PdfWriter {
            doc,
            layer,
            font,
            bold,
            y: MARGIN,
        })
    }

    fn advance(&mut self, delta: f64) {
        self.y += delta;
    }

    fn ensure_room(&mut self, needed: f64) {
        if self.y + needed <= PAGE_HEIGHT - BOTTOM_MARGIN {
            return;
        }
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = MARGIN;
    }

    fn text(&self, text: &str, size: f64, x: f64, bold: bool) {
        let font = if bold { &self.bold } else { &self.font };
        self.layer
            .use_text(text, size, Mm(x), Mm(PAGE_HEIGHT - self.y), font);
    }

    fn centered_text(&self, text: &str, size: f64, bold: bool) {
        let width = text.chars().count() as f64 * size * CHAR_WIDTH_FACTOR;
        let x = (PAGE_WIDTH - width).max(0.0) / 2.0;
        self.text(text, size, x, bold);
    }

    fn horizontal_line(&self, x1: f64, x2: f64, y_from_top: f64) {
        self.line(x1, y_from_top, x2, y_from_top);
    }

    fn vertical_line(&self, x: f64, y1_from_top: f64, y2_from_top: f64) {
        self.line(x, y1_from_top, x, y2_from_top);
    }

    fn line(&self, x1: f64, y1: f64, x2: f64, y2: f64) {
        let shape = Line {
            points: vec![
                (Point::new(Mm(x1), Mm(PAGE_HEIGHT - y1)), false),
                (Point::new(Mm(x2), Mm(PAGE_HEIGHT - y2)), false),
            ],
            is_closed: false,
            has_fill: false,
            has_stroke: true,
            is_clipping_path: false,
        };
        self.layer.set_outline_thickness(0.3);
        self.layer.add_shape(shape);
    }

    /// Column x-offsets. Template tables pin the "#" and "Details" columns to
    /// the widths of the paper form; everything else shares the remainder.
    fn column_edges(&self, column_count: usize, template: bool) -> Vec<f64> {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        let mut edges = vec![MARGIN];
        if template && column_count > 2 {
            let fixed = [10.0, 35.0];
            let rest = (usable - fixed[0] - fixed[1]) / (column_count - 2) as f64;
            let mut x = MARGIN;
            for index in 0..column_count {
                x += match index {
                    0 => fixed[0],
                    1 => fixed[1],
                    _ => rest,
                };
                edges.push(x);
            }
        } else {
            let width = usable / column_count.max(1) as f64;
            for index in 1..=column_count {
                edges.push(MARGIN + width * index as f64);
            }
        }
        edges
    }

    fn table(&mut self, section: &Section, template: bool) {
        let edges = self.column_edges(section.columns.len(), template);
        let size = if template { 8.0 } else { 9.0 };

        if let Some(heading) = &section.heading {
            self.ensure_room(ROW_HEIGHT * 2.0);
            self.text(heading, 11.0, MARGIN, true);
            self.advance(6.0);
        }

        self.header_row(section, &edges, size);
        for row in &section.rows {
            self.ensure_room(ROW_HEIGHT);
            if self.y == MARGIN {
                // Fresh page: repeat the header so the grid stays readable.
                self.header_row(section, &edges, size);
            }
            self.grid_row(row, &edges, size, false);
        }
    }

    fn header_row(&mut self, section: &Section, edges: &[f64], size: f64) {
        self.ensure_room(ROW_HEIGHT);
        self.horizontal_line(edges[0], edges[edges.len() - 1], self.y);
        self.grid_row(&section.columns, edges, size, true);
    }

    fn grid_row(&mut self, cells: &[String], edges: &[f64], size: f64, bold: bool) {
        let top = self.y;
        let bottom = self.y + ROW_HEIGHT;
        for (index, cell) in cells.iter().enumerate() {
            let left = edges[index];
            let right = edges[index + 1];
            let fitted = truncate_to_width(cell, right - left - 2.0, size);
            self.layer.use_text(
                fitted,
                size,
                Mm(left + 1.0),
                Mm(PAGE_HEIGHT - (top + ROW_HEIGHT - 2.0)),
                if bold { &self.bold } else { &self.font },
            );
        }
        for edge in edges {
            self.vertical_line(*edge, top, bottom);
        }
        self.horizontal_line(edges[0], edges[edges.len() - 1], bottom);
        self.y = bottom;
    }

    fn finish(self) -> Result<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .map_err(|e| Error::render(e.to_string()))
    }
}

fn truncate_to_width(text: &str, width_mm: f64, size: f64) -> String {
    let capacity = (width_mm / (size * CHAR_WIDTH_FACTOR)).max(1.0) as usize;
    if text.chars().count() <= capacity {
        return text.to_string();
    }
    let mut fitted: String = text.chars().take(capacity.saturating_sub(1)).collect();
    fitted.push('…');
    fitted
}
