//! roofdesk common library
//!
//! CLIとストア層で共有される型と純粋ロジック

pub mod categories;
pub mod error;
pub mod schedule;
pub mod types;

pub use categories::{AliasConfig, InspectionCategory};
pub use error::{Error, Result};
pub use schedule::{find_conflicts, group_by_day, month_grid, move_job, Conflict};
pub use types::{
    format_amount, new_id, Capture, Client, Finding, Inspection, InspectionPhoto, Job, JobStatus,
    MediaKind, Packet, PacketPhoto, PacketStatus, Record, Severity, Signature,
};
