//! File input and report output
//!
//! # Architecture
//!
//! - `input`: line-delimited text readers for messages, news, scenarios and
//!   incidents
//! - `export`: CSV and Excel writers for the pipeline's reports
//!
//! Output files land in the configured output directory under fixed names:
//!
//! ```text
//! output/
//! ├── classified_messages.csv
//! ├── classified_messages.xlsx
//! ├── flood_report.csv
//! ├── flood_report.xlsx
//! ├── priority_scores.csv
//! └── llm_calls.csv        (run log, written by `runlog`)
//! ```

pub mod export;
pub mod input;

pub use export::{
    CLASSIFIED_CSV, CLASSIFIED_XLSX, ExportResult, FLOOD_REPORT_CSV, FLOOD_REPORT_XLSX,
    PRIORITY_SCORES_CSV, write_classified_csv, write_classified_xlsx, write_flood_report_csv,
    write_flood_report_xlsx, write_priority_scores_csv,
};
pub use input::{read_incidents, read_lines, read_scenarios};
