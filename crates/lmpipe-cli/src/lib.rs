//! Terminal output for the lmpipe CLI

mod logging;
mod observer;
mod ui;


pub use logging::{init_logging, log_filter};
pub use observer::ConsoleObserver;
pub use ui::{
    display_banner, print_chunks, print_summary_report, print_ingest_report, print_answer,
    summary_table, ingest_table,
};

// Re-export core types
pub use lmpipe_core::{Error, Result};
