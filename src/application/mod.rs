//! Application layer: the services that orchestrate the domain ports.
//!
//! `RoundOrchestrator` turns a computed allocation into a committed round,
//! `RetentionPolicyEvaluator` decides each investor's retention and
//! withholding, and `PaymentCollector` drives the gateway collection and
//! webhook reconciliation.

pub mod collector;
pub mod orchestrator;
pub mod retention;
