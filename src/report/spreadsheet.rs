//! Renders a report as an Excel workbook with a transactions sheet and a summary sheet.

use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::{Error, report::ReportSummary, transaction::TransactionRow};

const HEADINGS: [&str; 7] = [
    "Date",
    "Type",
    "Description",
    "Category",
    "Amount",
    "Payee/Payer",
    "Notes",
];

const CURRENCY_FORMAT: &str = "$#,##0.00";

fn write_workbook(
    title: &str,
    rows: &[TransactionRow],
    summary: &ReportSummary,
) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let currency = Format::new().set_num_format(CURRENCY_FORMAT);

    let transactions = workbook.add_worksheet().set_name("Transactions")?;
    for (column, heading) in (0u16..).zip(HEADINGS) {
        transactions.write_string_with_format(0, column, heading, &bold)?;
    }
    for (row_number, row) in (1u32..).zip(rows) {
        transactions.write_string(row_number, 0, row.date.to_string())?;
        transactions.write_string(row_number, 1, row.transaction_type.label())?;
        transactions.write_string(row_number, 2, &row.description)?;
        transactions.write_string(row_number, 3, &row.category_name)?;
        transactions.write_number_with_format(row_number, 4, row.amount, &currency)?;
        transactions.write_string(row_number, 5, row.party.as_deref().unwrap_or_default())?;
        transactions.write_string(row_number, 6, row.notes.as_deref().unwrap_or_default())?;
    }
    transactions.autofit();

    let summary_sheet = workbook.add_worksheet().set_name("Summary")?;
    summary_sheet.write_string_with_format(0, 0, title, &bold)?;
    for (row_number, (label, amount)) in (2u32..).zip([
        ("Total Income", summary.total_income),
        ("Total Expenses", summary.total_expense),
        ("Net Amount", summary.net),
    ]) {
        summary_sheet.write_string_with_format(row_number, 0, label, &bold)?;
        summary_sheet.write_number_with_format(row_number, 1, amount, &currency)?;
    }
    summary_sheet.write_string(6, 0, "Transactions")?;
    summary_sheet.write_number(6, 1, rows.len() as f64)?;
    summary_sheet.autofit();

    workbook.save_to_buffer()
}

/// Render `rows` as an XLSX workbook with the summary totals on a second sheet.
///
/// # Errors
/// Returns [Error::ReportError] if the workbook could not be encoded.
pub fn render_xlsx(
    title: &str,
    rows: &[TransactionRow],
    summary: &ReportSummary,
) -> Result<Vec<u8>, Error> {
    write_workbook(title, rows, summary).map_err(|error| {
        tracing::error!("Could not render spreadsheet report: {error}");
        Error::ReportError(error.to_string())
    })
}

#[cfg(test)]
mod spreadsheet_tests {
    use crate::report::{summarize, summary::summary_tests::sample_rows};

    use std::io::{Cursor, Read};

    use super::render_xlsx;

    fn read_part(bytes: Vec<u8>, name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut part = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut part)
            .unwrap();
        part
    }

    #[test]
    fn renders_xlsx_workbook() {
        let rows = sample_rows();

        let bytes = render_xlsx("Financial Report", &rows, &summarize(&rows)).unwrap();

        // XLSX files are zip archives.
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn summary_sheet_contains_totals() {
        let rows = sample_rows();
        let bytes = render_xlsx("Financial Report", &rows, &summarize(&rows)).unwrap();

        let summary_sheet = read_part(bytes.clone(), "xl/worksheets/sheet2.xml");
        let shared_strings = read_part(bytes, "xl/sharedStrings.xml");

        for total in ["<v>800</v>", "<v>200</v>", "<v>600</v>", "<v>3</v>"] {
            assert!(summary_sheet.contains(total), "missing {total}");
        }
        for label in ["Total Income", "Total Expenses", "Net Amount", "Freelance work"] {
            assert!(shared_strings.contains(label), "missing {label}");
        }
    }

    #[test]
    fn renders_empty_report() {
        let bytes = render_xlsx("Financial Report", &[], &summarize(&[])).unwrap();

        assert!(bytes.starts_with(b"PK"));
    }
}
