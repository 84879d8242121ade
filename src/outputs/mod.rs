//! Export of assembled metadata tables.
//!
//! # Output Structure
//!
//! One CSV file per homepage per run, grouped by host:
//!
//! ```text
//! output_dir/
//! └── www_example_de/
//!     ├── www_example_de_2026-10-17_08-00-00.csv
//!     └── www_example_de_2026-10-17_09-00-00.csv
//! ```

pub mod csv;
