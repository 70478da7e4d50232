//! # Monthly Report
//!
//! Builds the spreadsheet sent by the report flow. Layout is computed first
//! as plain data so ordering and totals can be checked without decoding xlsx.

use anyhow::{Context, Result};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::collections::BTreeMap;
use tracing::info;

use crate::models::{round_cents, Category, TimeRecord};

pub const COLUMNS: [&str; 5] = ["Fecha", "Proyecto", "Descripción", "Categoría", "Horas"];
const COLUMN_WIDTHS: [f64; 5] = [14.0, 25.0, 50.0, 25.0, 10.0];

const TITLE_COLOR: u32 = 0x2B5797;
const HEADER_FILL: u32 = 0x2B5797;
const SUBTOTAL_FILL: u32 = 0xD9E2F3;
const TOTAL_FILL: u32 = 0x1F4E79;

const HEADER_ROW: u32 = 2;

const MONTHS_ES: [&str; 12] = [
    "Enero", "Febrero", "Marzo", "Abril", "Mayo", "Junio", "Julio", "Agosto", "Septiembre",
    "Octubre", "Noviembre", "Diciembre",
];

/// Spanish month name, or the number itself when out of range
pub fn month_name(month: u32) -> String {
    match month {
        1..=12 => MONTHS_ES[(month - 1) as usize].to_string(),
        _ => month.to_string(),
    }
}

/// File name used for the attachment
pub fn report_file_name(month: u32, year: i32) -> String {
    format!("reporte_{}_{}.xlsx", month_name(month), year)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub date: String,
    pub project: String,
    pub description: String,
    pub category: String,
    pub hours: f64,
}

/// Everything that ends up in the sheet, in display order
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub title: String,
    pub sheet_name: String,
    pub rows: Vec<ReportRow>,
    /// Sorted by project name
    pub project_totals: Vec<(String, f64)>,
    /// Sorted by category key
    pub category_totals: Vec<(Category, f64)>,
    pub grand_total: f64,
}

pub fn build_layout(records: &[TimeRecord], month: u32, year: i32, display_name: Option<&str>) -> ReportLayout {
    let month_label = month_name(month);
    let mut title = format!("Reporte de Tiempos — {month_label} {year}");
    if let Some(name) = display_name.filter(|n| !n.trim().is_empty()) {
        title.push_str(&format!(" — {}", name.trim()));
    }

    let mut sorted: Vec<&TimeRecord> = records.iter().collect();
    sorted.sort_by(|a, b| (a.date, a.created_at).cmp(&(b.date, b.created_at)));

    let mut by_project: BTreeMap<String, f64> = BTreeMap::new();
    let mut by_category: BTreeMap<&'static str, (Category, f64)> = BTreeMap::new();
    let mut grand_total = 0.0;

    let rows = sorted
        .into_iter()
        .map(|r| {
            grand_total += r.hours;
            *by_project.entry(r.project.clone()).or_insert(0.0) += r.hours;
            by_category.entry(r.category.as_key()).or_insert((r.category, 0.0)).1 += r.hours;

            ReportRow {
                date: r.date.format("%Y-%m-%d").to_string(),
                project: r.project.clone(),
                description: r.description.clone(),
                category: r.category.label().to_string(),
                hours: r.hours,
            }
        })
        .collect();

    ReportLayout {
        title,
        sheet_name: format!("{month_label} {year}"),
        rows,
        project_totals: by_project.into_iter().map(|(p, h)| (p, round_cents(h))).collect(),
        category_totals: by_category.into_values().map(|(c, h)| (c, round_cents(h))).collect(),
        grand_total: round_cents(grand_total),
    }
}

struct Styles {
    title: Format,
    header: Format,
    data: Format,
    data_hours: Format,
    section: Format,
    subtotal: Format,
    subtotal_hours: Format,
    total: Format,
    total_hours: Format,
}

impl Styles {
    fn new() -> Self {
        let base = Format::new().set_font_name("Calibri");
        let bordered = base.clone().set_border(FormatBorder::Thin);

        Self {
            title: base
                .clone()
                .set_font_size(14)
                .set_bold()
                .set_font_color(Color::RGB(TITLE_COLOR))
                .set_align(FormatAlign::Center),
            header: bordered
                .clone()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(HEADER_FILL))
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_text_wrap(),
            data: bordered.clone().set_font_size(10).set_align(FormatAlign::Top).set_text_wrap(),
            data_hours: bordered
                .clone()
                .set_font_size(10)
                .set_align(FormatAlign::Top)
                .set_num_format("0.00"),
            section: base
                .clone()
                .set_bold()
                .set_font_color(Color::RGB(TITLE_COLOR)),
            subtotal: bordered
                .clone()
                .set_font_size(10)
                .set_bold()
                .set_background_color(Color::RGB(SUBTOTAL_FILL)),
            subtotal_hours: bordered
                .clone()
                .set_font_size(10)
                .set_bold()
                .set_background_color(Color::RGB(SUBTOTAL_FILL))
                .set_num_format("0.00"),
            total: bordered
                .clone()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(TOTAL_FILL)),
            total_hours: bordered
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(TOTAL_FILL))
                .set_num_format("0.00"),
        }
    }
}

/// Fill a full-width styled row with blanks, then write `label` and `hours`
fn write_band(
    sheet: &mut Worksheet,
    row: u32,
    label_col: u16,
    label: &str,
    hours: f64,
    label_format: &Format,
    hours_format: &Format,
) -> Result<()> {
    for col in 0..COLUMNS.len() as u16 {
        sheet.write_blank(row, col, label_format)?;
    }
    sheet.write_string_with_format(row, label_col, label, label_format)?;
    sheet.write_number_with_format(row, 4, hours, hours_format)?;
    Ok(())
}

/// Render a layout to xlsx bytes
pub fn render_xlsx(layout: &ReportLayout) -> Result<Vec<u8>> {
    let styles = Styles::new();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet
        .set_name(&layout.sheet_name)
        .context("Invalid worksheet name")?;

    let last_col = (COLUMNS.len() - 1) as u16;
    sheet.merge_range(0, 0, 0, last_col, &layout.title, &styles.title)?;

    for (col, (header, width)) in COLUMNS.iter().zip(COLUMN_WIDTHS).enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(HEADER_ROW, col, *header, &styles.header)?;
        sheet.set_column_width(col, width)?;
    }

    let mut row = HEADER_ROW + 1;
    for r in &layout.rows {
        sheet.write_string_with_format(row, 0, &r.date, &styles.data)?;
        sheet.write_string_with_format(row, 1, &r.project, &styles.data)?;
        sheet.write_string_with_format(row, 2, &r.description, &styles.data)?;
        sheet.write_string_with_format(row, 3, &r.category, &styles.data)?;
        sheet.write_number_with_format(row, 4, r.hours, &styles.data_hours)?;
        row += 1;
    }

    row += 1;
    sheet.write_string_with_format(row, 0, "Totales por Proyecto", &styles.section)?;
    row += 1;
    for (project, hours) in &layout.project_totals {
        write_band(sheet, row, 1, project, *hours, &styles.subtotal, &styles.subtotal_hours)?;
        row += 1;
    }

    row += 1;
    sheet.write_string_with_format(row, 0, "Totales por Categoría", &styles.section)?;
    row += 1;
    for (category, hours) in &layout.category_totals {
        write_band(sheet, row, 3, category.label(), *hours, &styles.subtotal, &styles.subtotal_hours)?;
        row += 1;
    }

    row += 1;
    write_band(sheet, row, 3, "TOTAL GENERAL", layout.grand_total, &styles.total, &styles.total_hours)?;

    let bytes = workbook.save_to_buffer().context("Failed to serialize workbook")?;
    Ok(bytes)
}

/// Build and render the report for one month
pub fn generate_report(records: &[TimeRecord], month: u32, year: i32, display_name: Option<&str>) -> Result<Vec<u8>> {
    let layout = build_layout(records, month, year, display_name);
    let bytes = render_xlsx(&layout)?;
    info!(
        title = %layout.title,
        records = records.len(),
        total_hours = layout.grand_total,
        bytes = bytes.len(),
        "Generated XLSX report"
    );
    Ok(bytes)
}
