//! Financial reports over a date range, exported as PDF or Excel documents.

mod page;
mod pdf;
mod spreadsheet;
mod summary;

use std::str::FromStr;

pub use page::{ReportForm, ReportState, generate_report_endpoint, get_reports_page};
pub use pdf::render_pdf;
pub use spreadsheet::render_xlsx;
pub use summary::{ReportSummary, summarize};

/// The document formats a report can be exported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Pdf,
    Xlsx,
}

impl ReportFormat {
    /// The value used in the report form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Xlsx => "xlsx",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "PDF",
            ReportFormat::Xlsx => "Excel",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(ReportFormat::Pdf),
            "xlsx" | "excel" => Ok(ReportFormat::Xlsx),
            other => Err(format!("\"{other}\" is not a report format")),
        }
    }
}
