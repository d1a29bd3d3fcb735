//! Operational surfaces: CSV readers for computation input and a CSV
//! writer for the resulting dividend register.

pub mod csv;
