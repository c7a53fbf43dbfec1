use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod aggregate;
mod catalog;
mod db;
mod error;
mod models;
mod pdf;
mod print;
mod render;
mod session;
mod stats;

use aggregate::{apply_filters, group_by_division_and_class, DivisionResolution};
use catalog::{ClassCatalog, SchoolCatalog};
use db::{AttendanceStore, PgAttendanceStore};
use models::{
    display_date, parse_roll_numbers, AttendanceEntry, Division, ReportFilter, ReportFormat,
    ReportMetadata,
};
use render::{visible_format, RenderInput, Section};
use session::ReportSession;

#[derive(Parser)]
#[command(name = "attendance-register")]
#[command(about = "Daily attendance register and report generator for sanskruti School", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import attendance rows from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record one class's attendance for a day
    Record {
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        class: String,
        #[arg(long)]
        total: i32,
        #[arg(long)]
        present: i32,
        /// Comma separated, e.g. "5, 12, 15"
        #[arg(long, default_value = "")]
        absent_rolls: String,
        #[arg(long)]
        teacher: String,
    },
    /// List attendance records for a date range
    List {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Division label or slug (e.g. "middle" for "Middle (6-10)")
        #[arg(long)]
        division: Option<Division>,
        #[arg(long)]
        class: Option<String>,
    },
    /// Show a single attendance record
    Show {
        #[arg(long)]
        id: Uuid,
    },
    /// Edit an existing attendance record (class stays fixed)
    Edit {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        total: Option<i32>,
        #[arg(long)]
        present: Option<i32>,
        #[arg(long)]
        absent_rolls: Option<String>,
        #[arg(long)]
        teacher: Option<String>,
    },
    /// Delete an attendance record
    Delete {
        #[arg(long)]
        id: Uuid,
    },
    /// One day's dashboard summary
    Stats {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Generate a report (stdout preview, PDF, print page, or JSON)
    Report {
        /// Defaults to 30 days ago
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Defaults to today
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        division: Option<Division>,
        #[arg(long)]
        class: Option<String>,
        #[arg(long, default_value = "summary")]
        format: ReportFormat,
        /// Write a PDF (all sections); defaults to Attendance_Report.pdf
        #[arg(long, num_args = 0..=1, default_missing_value = pdf::DEFAULT_FILENAME)]
        pdf: Option<PathBuf>,
        /// Write the print page (visible table only)
        #[arg(long)]
        print_html: Option<PathBuf>,
        /// Dump the document model as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Resolve divisions the way the register historically did, against
        /// the selected division only (requires --division)
        #[arg(long, requires = "division")]
        legacy_division_lookup: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let catalog: Arc<dyn ClassCatalog> = Arc::new(SchoolCatalog::default());
    let store = PgAttendanceStore::new(pool.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&store, catalog.as_ref()).await?;
            println!("Seed data inserted ({inserted} records).");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&store, catalog.as_ref(), &csv).await?;
            println!("Inserted {inserted} records from {}.", csv.display());
        }
        Commands::Record {
            date,
            class,
            total,
            present,
            absent_rolls,
            teacher,
        } => {
            let record = AttendanceEntry {
                date: date.unwrap_or_else(today),
                class_id: class,
                total_students: total,
                present_students: present,
                absent_roll_numbers: parse_roll_numbers(&absent_rolls),
                teacher_name: teacher,
            }
            .finalize(catalog.as_ref())?;

            let summary = format!(
                "{} on {}: {}/{} present ({})",
                record.class_id,
                display_date(record.date),
                record.present_students,
                record.total_students,
                render::format_percentage(record.attendance_percentage.unwrap_or(0.0)),
            );
            store.create(record).await?;
            println!("Attendance recorded for {summary}.");
        }
        Commands::List {
            start,
            end,
            division,
            class,
        } => {
            let filter = ReportFilter {
                start_date: start.unwrap_or_else(|| today() - Duration::days(7)),
                end_date: end.unwrap_or_else(today),
                division,
                class_id: class,
                format: ReportFormat::Summary,
            };
            filter.validate(catalog.as_ref())?;

            let records = store
                .fetch_by_date_range(filter.start_date, filter.end_date)
                .await?;
            let filtered = apply_filters(&records, &filter, catalog.as_ref());

            if filtered.is_empty() {
                println!("No attendance records found for the selected filters.");
                return Ok(());
            }
            for record in &filtered {
                let class_name = catalog
                    .resolve_class(&record.class_id)
                    .map(|info| info.name.clone())
                    .unwrap_or_else(|| record.class_id.clone());
                println!(
                    "{}  {}  {}/{} present, {} absent, {}  {}  [{}]",
                    display_date(record.date),
                    class_name,
                    record.present_students,
                    record.total_students,
                    record.absent_students,
                    render::format_percentage(aggregate::percentage_or_zero(record)),
                    record.teacher_name,
                    record.id,
                );
            }
        }
        Commands::Show { id } => {
            let record = store.fetch_by_id(id).await?;
            let class_name = catalog
                .resolve_class(&record.class_id)
                .map(|info| info.name.clone())
                .unwrap_or_else(|| record.class_id.clone());
            println!("Date:       {}", display_date(record.date));
            println!("Class:      {class_name}");
            println!("Total:      {}", record.total_students);
            println!("Present:    {}", record.present_students);
            println!("Absent:     {}", record.absent_students);
            println!("Rolls out:  {}", record.absent_roll_numbers.join(", "));
            println!(
                "Percentage: {}",
                render::format_percentage(aggregate::percentage_or_zero(&record))
            );
            println!("Teacher:    {}", record.teacher_name);
        }
        Commands::Edit {
            id,
            date,
            total,
            present,
            absent_rolls,
            teacher,
        } => {
            let existing = store.fetch_by_id(id).await?;
            let entry = AttendanceEntry {
                date: date.unwrap_or(existing.date),
                class_id: existing.class_id.clone(),
                total_students: total.unwrap_or(existing.total_students),
                present_students: present.unwrap_or(existing.present_students),
                absent_roll_numbers: absent_rolls
                    .map(|rolls| parse_roll_numbers(&rolls))
                    .unwrap_or(existing.absent_roll_numbers),
                teacher_name: teacher.unwrap_or(existing.teacher_name),
            };
            let mut updated = entry.finalize(catalog.as_ref())?;
            updated.id = existing.id;
            store.update(updated).await?;
            println!("Attendance record {id} updated.");
        }
        Commands::Delete { id } => {
            // Confirm the delete before reporting it gone.
            store.delete(id).await?;
            println!("Attendance record {id} deleted.");
        }
        Commands::Stats { date } => {
            let date = date.unwrap_or_else(today);
            let records = store.fetch_by_date(date).await?;
            let day = stats::for_day(date, records);

            println!("Dashboard for {}:", display_date(day.date));
            println!("- Total students:     {}", day.total_students);
            println!("- Present today:      {}", day.present_students);
            println!(
                "- Average attendance: {}",
                render::format_percentage(day.average_attendance)
            );
            println!("- Classes reporting:  {}", day.class_count);
            for record in &day.class_wise {
                println!(
                    "  {}: {}",
                    record.class_id,
                    render::format_percentage(aggregate::percentage_or_zero(record))
                );
            }
        }
        Commands::Report {
            start,
            end,
            division,
            class,
            format,
            pdf: pdf_out,
            print_html,
            json,
            legacy_division_lookup,
        } => {
            let filter = ReportFilter {
                start_date: start.unwrap_or_else(|| today() - Duration::days(30)),
                end_date: end.unwrap_or_else(today),
                division,
                class_id: class,
                format,
            };

            // Fetches go through the sequenced session so a slow stale
            // response can never overwrite a newer snapshot.
            let report_session = ReportSession::new(Arc::new(store), Arc::clone(&catalog));
            let filtered = report_session.refresh(&filter).await?.unwrap_or_default();

            if filtered.is_empty() {
                println!("No attendance records found for the selected criteria.");
                return Ok(());
            }

            let generated_on = today();
            let metadata = ReportMetadata::new(&filter, catalog.as_ref(), generated_on);

            let document = match filter.format {
                ReportFormat::Template => {
                    let resolution = match (legacy_division_lookup, filter.division) {
                        (true, Some(selected)) => DivisionResolution::SelectedDivision(selected),
                        _ => DivisionResolution::RecordClass,
                    };
                    let grouped = group_by_division_and_class(&filtered, catalog.as_ref(), resolution);
                    if !grouped.skipped.is_empty() {
                        println!(
                            "Warning: {} record(s) had no resolvable division and were excluded.",
                            grouped.skipped.len()
                        );
                    }
                    if grouped.is_empty() {
                        println!("No records could be grouped for the template format.");
                        return Ok(());
                    }
                    render::render(RenderInput::Grouped(&grouped), filter.format, &metadata)?
                }
                _ => render::render(RenderInput::Flat(&filtered), filter.format, &metadata)?,
            };

            if let Some(path) = pdf_out {
                pdf::export_to_file(&document, filter.format, generated_on, &path)?;
                println!("Report written to {}.", path.display());
            } else if let Some(path) = print_html {
                let visible = render::render(
                    RenderInput::Flat(&filtered),
                    visible_format(filter.format),
                    &metadata,
                )?;
                std::fs::write(&path, print::page(&visible))?;
                println!("Print page written to {}.", path.display());
            } else if let Some(path) = json {
                let file = std::fs::File::create(&path)?;
                serde_json::to_writer_pretty(file, &document)?;
                println!("Document model written to {}.", path.display());
            } else {
                let preview = render::render(
                    RenderInput::Flat(&filtered),
                    visible_format(filter.format),
                    &metadata,
                )?;
                println!("{}", metadata.date_range_label);
                println!("{} / {}", metadata.division_label, metadata.class_label);
                println!();
                for section in &preview.sections {
                    print_section(section);
                }
            }
        }
    }

    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn print_section(section: &Section) {
    let mut widths: Vec<usize> = section.columns.iter().map(String::len).collect();
    for row in &section.rows {
        for (index, cell) in row.iter().enumerate() {
            if cell.len() > widths[index] {
                widths[index] = cell.len();
            }
        }
    }

    let header: Vec<String> = section
        .columns
        .iter()
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    println!("{}", header.join("  "));
    println!("{}", "-".repeat(header.join("  ").len()));
    for row in &section.rows {
        let line: Vec<String> = row
            .iter()
            .zip(widths.iter().copied())
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        println!("{}", line.join("  "));
    }
}
