//! Chronicle event store: durable homes for the event log and the audit
//! trail.
//!
//! `memory` backs tests and single-process deployments; the `pg_*` modules
//! back production on PostgreSQL.

pub mod memory;
pub mod pg_audit_store;
pub mod pg_event_log;
pub mod schema;
