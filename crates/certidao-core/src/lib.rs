//! Core types for deed extraction: the fixed record, model-reply JSON recovery, CSV output.

mod csv_out;
mod error;
pub mod extract;
pub mod record;

pub use csv_out::{write_csv, write_csv_file};
pub use error::CoreError;
pub use extract::extract_json_object;
pub use record::{CertidaoRecord, Field};
