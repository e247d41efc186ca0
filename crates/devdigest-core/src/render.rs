//! Terminal and JSON rendering of a report list.
//!
//! The renderer is a pure consumer of [`Report`]s and knows nothing about
//! individual modules. It writes to any `io::Write` so output can be captured.

use std::io::{self, Write};

use console::{measure_text_width, pad_str, Alignment, Style};
use serde_json::Value;

use crate::report::{Report, Table, DURATION_META_KEY};

/// Console vs. machine-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    pub color: bool,
}

/// What was written, for callers that want to check nothing was dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub reports: usize,
    pub sections: usize,
    pub tables: usize,
    pub table_rows: usize,
    pub lines: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl RenderSummary {
    /// Counts what a faithful rendering of `reports` contains.
    pub fn expected(reports: &[Report]) -> Self {
        let mut summary = Self {
            reports: reports.len(),
            ..Self::default()
        };
        for report in reports {
            summary.warnings += report.warnings.len();
            summary.errors += report.errors.len();
            summary.sections += report.sections.len();
            for section in &report.sections {
                if let Some(table) = &section.table {
                    summary.tables += 1;
                    summary.table_rows += table.rows.len();
                }
                summary.lines += section.lines.len();
            }
        }
        summary
    }
}

/// Color only on a terminal, unless `--no-color` or `console.color: false` turn it off.
pub fn should_color(no_color_flag: bool, configured: Option<bool>, stdout_is_tty: bool) -> bool {
    !no_color_flag && configured != Some(false) && stdout_is_tty
}

struct Palette {
    title: Style,
    subtle: Style,
    ok: Style,
    warn: Style,
    error: Style,
    bold: Style,
}

impl Palette {
    fn new(color: bool) -> Self {
        let base = Style::new().force_styling(color);
        Self {
            title: base.clone().cyan().bright().bold(),
            subtle: base.clone().black().bright(),
            ok: base.clone().green().bright(),
            warn: base.clone().yellow().bright(),
            error: base.clone().red().bright(),
            bold: base.bold(),
        }
    }
}

pub fn render_reports<W: Write>(
    out: &mut W,
    reports: &[Report],
    options: RenderOptions,
) -> io::Result<RenderSummary> {
    let palette = Palette::new(options.color);
    let mut summary = RenderSummary::default();

    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        render_report(out, report, &palette, &mut summary)?;
        summary.reports += 1;
    }

    writeln!(out, "{}", "─".repeat(50))?;
    writeln!(out, "{}", palette.ok.apply_to("Done."))?;
    Ok(summary)
}

fn render_report<W: Write>(
    out: &mut W,
    report: &Report,
    palette: &Palette,
    summary: &mut RenderSummary,
) -> io::Result<()> {
    writeln!(
        out,
        "{} {}",
        palette.title.apply_to("■"),
        palette.title.apply_to(&report.title)
    )?;
    if !report.summary.is_empty() {
        writeln!(out, "{} {}", palette.subtle.apply_to("→ "), report.summary)?;
    }
    for warning in &report.warnings {
        writeln!(out, "{} {}", palette.warn.apply_to("!"), warning)?;
        summary.warnings += 1;
    }
    for error in &report.errors {
        writeln!(out, "{} {}", palette.error.apply_to("x"), error)?;
        summary.errors += 1;
    }

    for section in &report.sections {
        if !section.header.is_empty() {
            writeln!(out, "   {}", palette.bold.apply_to(&section.header))?;
        }
        if let Some(table) = &section.table {
            render_table(out, table)?;
            summary.tables += 1;
            summary.table_rows += table.rows.len();
        }
        for line in &section.lines {
            writeln!(out, "     {line}")?;
            summary.lines += 1;
        }
        summary.sections += 1;
    }

    if let Some(Value::String(duration)) = report.meta.get(DURATION_META_KEY) {
        if !duration.is_empty() {
            writeln!(out, "{}", palette.subtle.apply_to(format!("took {duration}")))?;
        }
    }
    Ok(())
}

/// Borderless, left-aligned table with upper-cased headers.
fn render_table<W: Write>(out: &mut W, table: &Table) -> io::Result<()> {
    let columns = table
        .rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(table.headers.len()))
        .max()
        .unwrap_or(0);
    if columns == 0 {
        return Ok(());
    }

    let headers: Vec<String> = table.headers.iter().map(|h| h.to_uppercase()).collect();
    let mut widths = vec![0usize; columns];
    for row in std::iter::once(&headers).chain(table.rows.iter()) {
        for (col, cell) in row.iter().enumerate() {
            widths[col] = widths[col].max(measure_text_width(cell));
        }
    }

    if !headers.is_empty() {
        write_row(out, &headers, &widths)?;
    }
    for row in &table.rows {
        write_row(out, row, &widths)?;
    }
    Ok(())
}

fn write_row<W: Write>(out: &mut W, row: &[String], widths: &[usize]) -> io::Result<()> {
    let cells: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(col, width)| {
            let cell = row.get(col).map(String::as_str).unwrap_or("");
            pad_str(cell, *width, Alignment::Left, None).into_owned()
        })
        .collect();
    writeln!(out, "   {}", cells.join("  ").trim_end())
}

/// Pretty JSON array of reports, metadata included as an open map.
pub fn render_json<W: Write>(out: &mut W, reports: &[Report]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, reports)?;
    writeln!(out)
}
