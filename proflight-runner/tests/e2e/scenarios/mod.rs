//! E2E scenario groups.

mod cancellation;
mod cleanup;
mod config_error;
mod config_precedence;
mod direct_instance;
mod fault_isolation;
