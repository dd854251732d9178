//! Renders a report as an A4 PDF table.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};

use crate::{
    Error,
    html::format_currency,
    report::ReportSummary,
    transaction::TransactionRow,
};

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN: f32 = 15.0;
const LINE_HEIGHT: f32 = 6.0;
const FONT_SIZE: f32 = 9.0;

/// Descriptions longer than this are cut to this many characters plus "...".
pub const DESCRIPTION_MAX_CHARS: usize = 50;

/// The x position of each column in millimetres.
const COLUMNS: [(&str, f32); 5] = [
    ("Date", MARGIN),
    ("Type", 38.0),
    ("Description", 60.0),
    ("Category", 140.0),
    ("Amount", 175.0),
];

/// Keep the first [DESCRIPTION_MAX_CHARS] characters of `description`, marking a cut with "...".
pub fn truncate_description(description: &str) -> String {
    if description.chars().count() <= DESCRIPTION_MAX_CHARS {
        return description.to_owned();
    }

    let mut truncated: String = description.chars().take(DESCRIPTION_MAX_CHARS).collect();
    truncated.push_str("...");
    truncated
}

fn pdf_error(error: impl std::fmt::Display) -> Error {
    tracing::error!("Could not render PDF report: {error}");
    Error::ReportError(error.to_string())
}

/// Writes lines top to bottom, starting a new page when the current one is full.
struct PageWriter<'a> {
    document: &'a printpdf::PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    font: &'a IndirectFontRef,
    bold: &'a IndirectFontRef,
}

impl PageWriter<'_> {
    fn next_line(&mut self) {
        self.y -= LINE_HEIGHT;

        if self.y < MARGIN {
            let (page, layer) = self.document.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
            self.layer = self.document.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT.0 - MARGIN;
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { self.bold } else { self.font };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn header_row(&mut self) {
        for (heading, x) in COLUMNS {
            self.text(heading, FONT_SIZE, x, true);
        }
        self.next_line();
    }
}

/// Render `rows` as a PDF with `title` and the summary totals.
///
/// # Errors
/// Returns [Error::ReportError] if the document could not be encoded.
pub fn render_pdf(
    title: &str,
    rows: &[TransactionRow],
    summary: &ReportSummary,
) -> Result<Vec<u8>, Error> {
    let (document, page, layer) = PdfDocument::new(title, PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
    let font = document
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;
    let bold = document
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;

    let mut writer = PageWriter {
        document: &document,
        layer: document.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT.0 - MARGIN,
        font: &font,
        bold: &bold,
    };

    writer.text(title, 16.0, MARGIN, true);
    writer.next_line();
    writer.next_line();

    for (label, amount) in [
        ("Total Income", summary.total_income),
        ("Total Expenses", summary.total_expense),
        ("Net Amount", summary.net),
    ] {
        writer.text(label, 11.0, MARGIN, true);
        writer.text(&format_currency(amount), 11.0, 60.0, false);
        writer.next_line();
    }
    writer.next_line();

    writer.header_row();

    for row in rows {
        let values = [
            row.date.to_string(),
            row.transaction_type.label().to_owned(),
            truncate_description(&row.description),
            row.category_name.clone(),
            format_currency(row.amount),
        ];

        for ((_, x), value) in COLUMNS.iter().zip(values.iter()) {
            writer.text(value, FONT_SIZE, *x, false);
        }
        writer.next_line();
    }

    drop(writer);
    document.save_to_bytes().map_err(pdf_error)
}
