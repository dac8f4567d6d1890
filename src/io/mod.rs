mod format;
mod input;
mod report;

pub use format::DocumentFormat;
pub use input::{parse_document_any, parse_document_str};
pub use report::{ReportTarget, ReportWriter};
