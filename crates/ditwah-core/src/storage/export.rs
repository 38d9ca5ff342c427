//! CSV and Excel report writers

use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook, Worksheet};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::records::{ClassifiedMessage, CrisisEvent, ScoredIncident};

pub const CLASSIFIED_CSV: &str = "classified_messages.csv";
pub const CLASSIFIED_XLSX: &str = "classified_messages.xlsx";
pub const FLOOD_REPORT_CSV: &str = "flood_report.csv";
pub const FLOOD_REPORT_XLSX: &str = "flood_report.xlsx";
pub const PRIORITY_SCORES_CSV: &str = "priority_scores.csv";

const CLASSIFIED_HEADERS: [&str; 5] = ["message", "district", "intent", "priority", "raw_output"];
const FLOOD_REPORT_HEADERS: [&str; 5] = [
    "District",
    "Flood Level (m)",
    "Victim Count",
    "Main Need",
    "Status",
];

/// Widest a spreadsheet column is allowed to grow
const CLASSIFIED_MAX_WIDTH: usize = 50;
const FLOOD_REPORT_MAX_WIDTH: usize = 30;

/// Result of writing a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Serialize)]
struct ClassifiedRow<'a> {
    message: &'a str,
    district: &'a str,
    intent: String,
    priority: String,
    raw_output: &'a str,
}

impl<'a> From<&'a ClassifiedMessage> for ClassifiedRow<'a> {
    fn from(m: &'a ClassifiedMessage) -> Self {
        Self {
            message: &m.message,
            district: m.district_label(),
            intent: m.intent.to_string(),
            priority: m.priority.to_string(),
            raw_output: &m.raw_output,
        }
    }
}

#[derive(Serialize)]
struct FloodRow<'a> {
    #[serde(rename = "District")]
    district: &'static str,
    #[serde(rename = "Flood Level (m)")]
    flood_level_meters: Option<f64>,
    #[serde(rename = "Victim Count")]
    victim_count: u32,
    #[serde(rename = "Main Need")]
    main_need: &'a str,
    #[serde(rename = "Status")]
    status: String,
}

impl<'a> From<&'a CrisisEvent> for FloodRow<'a> {
    fn from(e: &'a CrisisEvent) -> Self {
        Self {
            district: e.district.as_str(),
            flood_level_meters: e.flood_level_meters,
            victim_count: e.victim_count,
            main_need: &e.main_need,
            status: e.status.to_string(),
        }
    }
}

#[derive(Serialize)]
struct PriorityRow<'a> {
    location: &'a str,
    description: &'a str,
    score: u8,
    reasoning: &'a str,
}

fn prepare(dir: &Path, file_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    Ok(dir.join(file_name))
}

fn write_csv<T: Serialize>(path: &Path, headers: &[&str], rows: impl Iterator<Item = T>) -> Result<usize> {
    // Headers are written explicitly so an empty report still has them
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(headers)?;

    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

/// Write `classified_messages.csv`
pub fn write_classified_csv(dir: &Path, results: &[ClassifiedMessage]) -> Result<ExportResult> {
    let path = prepare(dir, CLASSIFIED_CSV)?;
    let rows = write_csv(
        &path,
        &CLASSIFIED_HEADERS,
        results.iter().map(ClassifiedRow::from),
    )?;
    info!(path = %path.display(), rows, "Saved classifications");
    Ok(ExportResult { path, rows })
}

/// Write `flood_report.csv`
pub fn write_flood_report_csv(dir: &Path, events: &[CrisisEvent]) -> Result<ExportResult> {
    let path = prepare(dir, FLOOD_REPORT_CSV)?;
    let rows = write_csv(
        &path,
        &FLOOD_REPORT_HEADERS,
        events.iter().map(FloodRow::from),
    )?;
    info!(path = %path.display(), rows, "Saved flood report");
    Ok(ExportResult { path, rows })
}

/// Write `priority_scores.csv`
pub fn write_priority_scores_csv(dir: &Path, scored: &[ScoredIncident]) -> Result<ExportResult> {
    let path = prepare(dir, PRIORITY_SCORES_CSV)?;
    let rows = write_csv(
        &path,
        &["location", "description", "score", "reasoning"],
        scored.iter().map(|s| PriorityRow {
            location: &s.incident.location,
            description: &s.incident.description,
            score: s.score,
            reasoning: &s.reasoning,
        }),
    )?;
    info!(path = %path.display(), rows, "Saved priority scores");
    Ok(ExportResult { path, rows })
}

/// Column widths that fit the longest cell, capped
struct ColumnWidths {
    widths: Vec<usize>,
    max: usize,
}

impl ColumnWidths {
    fn new(headers: &[&str], max: usize) -> Self {
        Self {
            widths: headers.iter().map(|h| h.chars().count()).collect(),
            max,
        }
    }

    fn fit(&mut self, col: usize, text: &str) {
        if let Some(width) = self.widths.get_mut(col) {
            *width = (*width).max(text.chars().count());
        }
    }

    fn apply(&self, sheet: &mut Worksheet) -> Result<()> {
        for (col, width) in self.widths.iter().enumerate() {
            sheet.set_column_width(col as u16, ((*width + 2).min(self.max)) as f64)?;
        }
        Ok(())
    }
}

fn write_header(sheet: &mut Worksheet, headers: &[&str]) -> Result<()> {
    let bold = Format::new().set_bold();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }
    Ok(())
}

/// Write `classified_messages.xlsx` with a `Classifications` sheet
pub fn write_classified_xlsx(dir: &Path, results: &[ClassifiedMessage]) -> Result<ExportResult> {
    let path = prepare(dir, CLASSIFIED_XLSX)?;
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Classifications")?;
    write_header(sheet, &CLASSIFIED_HEADERS)?;

    let mut widths = ColumnWidths::new(&CLASSIFIED_HEADERS, CLASSIFIED_MAX_WIDTH);
    for (i, result) in results.iter().enumerate() {
        let row = (i + 1) as u32;
        let intent = result.intent.to_string();
        let priority = result.priority.to_string();
        let cells = [
            result.message.as_str(),
            result.district_label(),
            intent.as_str(),
            priority.as_str(),
            result.raw_output.as_str(),
        ];
        for (col, cell) in cells.iter().enumerate() {
            sheet.write_string(row, col as u16, *cell)?;
            widths.fit(col, cell);
        }
    }
    widths.apply(sheet)?;

    workbook.save(&path)?;
    info!(path = %path.display(), rows = results.len(), "Saved classifications workbook");
    Ok(ExportResult {
        path,
        rows: results.len(),
    })
}

/// Write `flood_report.xlsx` with a `Crisis Events` sheet
///
/// A missing flood level leaves its cell empty.
pub fn write_flood_report_xlsx(dir: &Path, events: &[CrisisEvent]) -> Result<ExportResult> {
    let path = prepare(dir, FLOOD_REPORT_XLSX)?;
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Crisis Events")?;
    write_header(sheet, &FLOOD_REPORT_HEADERS)?;

    let mut widths = ColumnWidths::new(&FLOOD_REPORT_HEADERS, FLOOD_REPORT_MAX_WIDTH);
    for (i, event) in events.iter().enumerate() {
        let row = (i + 1) as u32;

        sheet.write_string(row, 0, event.district.as_str())?;
        widths.fit(0, event.district.as_str());

        if let Some(level) = event.flood_level_meters {
            sheet.write_number(row, 1, level)?;
            widths.fit(1, &level.to_string());
        }

        sheet.write_number(row, 2, event.victim_count)?;
        widths.fit(2, &event.victim_count.to_string());

        sheet.write_string(row, 3, event.main_need.as_str())?;
        widths.fit(3, &event.main_need);

        let status = event.status.to_string();
        sheet.write_string(row, 4, status.as_str())?;
        widths.fit(4, &status);
    }
    widths.apply(sheet)?;

    workbook.save(&path)?;
    info!(path = %path.display(), rows = events.len(), "Saved flood report workbook");
    Ok(ExportResult {
        path,
        rows: events.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{District, EventStatus, Incident};
    use tempfile::TempDir;

    fn classified() -> Vec<ClassifiedMessage> {
        vec![
            ClassifiedMessage::parse(
                "We are trapped on the roof with 3 kids!",
                "District: None | Intent: Rescue | Priority: High",
            ),
            ClassifiedMessage::parse(
                "Need dry rations in Kandy",
                "District: Kandy | Intent: Supply | Priority: High",
            ),
        ]
    }

    fn events() -> Vec<CrisisEvent> {
        vec![
            CrisisEvent {
                district: District::Colombo,
                flood_level_meters: Some(2.5),
                victim_count: 40,
                main_need: "Boats".to_string(),
                status: EventStatus::Critical,
            },
            CrisisEvent {
                district: District::Kandy,
                flood_level_meters: None,
                victim_count: 3,
                main_need: "Landslide rescue".to_string(),
                status: EventStatus::Warning,
            },
        ]
    }

    #[test]
    fn test_classified_csv() {
        let dir = TempDir::new().unwrap();
        let result = write_classified_csv(dir.path(), &classified()).unwrap();

        assert_eq!(result.rows, 2);
        let content = fs::read_to_string(&result.path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("message,district,intent,priority,raw_output")
        );
        assert!(lines.next().unwrap().contains(",None,Rescue,High,"));
    }

    #[test]
    fn test_flood_report_csv_leaves_missing_level_empty() {
        let dir = TempDir::new().unwrap();
        let result = write_flood_report_csv(dir.path(), &events()).unwrap();

        let content = fs::read_to_string(&result.path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "District,Flood Level (m),Victim Count,Main Need,Status"
        );
        assert_eq!(lines[1], "Colombo,2.5,40,Boats,Critical");
        assert_eq!(lines[2], "Kandy,,3,Landslide rescue,Warning");
    }

    #[test]
    fn test_empty_report_has_header() {
        let dir = TempDir::new().unwrap();
        let result = write_flood_report_csv(dir.path(), &[]).unwrap();
        assert_eq!(result.rows, 0);
        let content = fs::read_to_string(&result.path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_priority_scores_csv() {
        let dir = TempDir::new().unwrap();
        let scored = vec![ScoredIncident {
            incident: Incident::new("Ja-Ela", "Insulin needed"),
            score: 9,
            reasoning: "Medical: +3\nScore: 9/10".to_string(),
        }];
        let result = write_priority_scores_csv(dir.path(), &scored).unwrap();

        let mut reader = csv::Reader::from_path(&result.path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "Ja-Ela");
        assert_eq!(&rows[0][2], "9");
        assert_eq!(&rows[0][3], "Medical: +3\nScore: 9/10");
    }

    #[test]
    fn test_workbooks_are_written() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested/output");

        let classified = write_classified_xlsx(&out, &classified()).unwrap();
        let report = write_flood_report_xlsx(&out, &events()).unwrap();

        assert!(classified.path.ends_with(CLASSIFIED_XLSX));
        assert!(fs::metadata(&classified.path).unwrap().len() > 0);
        assert_eq!(report.rows, 2);
        assert!(fs::metadata(&report.path).unwrap().len() > 0);
    }
}
