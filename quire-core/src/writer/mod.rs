//! PDF writing functionality

mod pdf_writer;

pub use pdf_writer::{format_pdf_date, PdfWriter, WriterOptions};
