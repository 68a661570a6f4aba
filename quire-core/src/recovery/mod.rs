//! Recovery for PDF files with damaged cross-reference data
//!
//! When the declared xref table is missing or points at the wrong bytes, the
//! reader falls back to a linear scan of the file for `N G obj` markers and
//! rebuilds the table from what it finds. The trailer is taken from the last
//! `trailer` dictionary (or xref stream) whose root survives, or synthesized
//! from the last document catalog.
//!
//! ```rust
//! use quire::recovery::rebuild_xref;
//!
//! let damaged = b"%PDF-1.4\n1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
//!                 2 0 obj << /Type /Pages /Kids [] /Count 0 >> endobj\n";
//! let xref = rebuild_xref(damaged, 256).unwrap();
//! assert_eq!(xref.len(), 2);
//! ```

pub mod scanner;
pub mod xref_recovery;

pub use scanner::{ObjectScanner, ObjectType, ScanResult, ScanStats, ScannedObject};
pub use xref_recovery::{rebuild_xref, RecoveryStats, XRefRecovery};
