//! # Storage Module
//!
//! Handles all data persistence for the new-family registry.
//!
//! The schema lives in [`connection::DbConnection`]; each aggregate gets its
//! own repository. Multi-statement flows that must be atomic — number
//! allocation at insert, renumbering after a deletion or believer-type
//! transition, graduate promotion — run on a single transaction inside the
//! owning repository method.

pub mod connection;
pub mod repositories;

pub use connection::DbConnection;
pub use repositories::{
    CodeRepository,
    EducationRepository,
    GraduateRepository,
    NewComerRepository,
    StatisticsRepository,
};
