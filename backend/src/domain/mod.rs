//! # Domain Module
//!
//! Business logic for the new-family registry.
//!
//! Each service owns one concern and talks to storage through its
//! repository. The rules that matter live here and in the repositories they
//! delegate to:
//!
//! - Display numbers are allocated when a registrant is inserted, scoped to
//!   (department, believer type, year), and reassigned by the reorder pass
//!   whenever a row leaves its sequence.
//! - A believer-type change is a transition: the row gets a fresh number in
//!   the target sequence and the source sequence closes its gap, atomically.
//! - Completing education promotes a registrant into the graduates table,
//!   which runs its own independent number sequence.
//! - Education progress is one upserted row per registrant.
//! - Statistics snapshots are derived data, rebuilt on demand.

pub mod code_service;
pub mod education_service;
pub mod export_service;
pub mod graduate_service;
pub mod new_comer_service;
pub mod statistics_service;

pub use code_service::CodeService;
pub use education_service::EducationService;
pub use export_service::ExportService;
pub use graduate_service::GraduateService;
pub use new_comer_service::NewComerService;
pub use statistics_service::StatisticsService;
