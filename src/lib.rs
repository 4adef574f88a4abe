//! rsannotate - resumable batch annotation of SNP identifiers.
//!
//! Extracts `rs` identifiers from variant and genotype files, looks them up
//! in fixed-size batches against an annotation service, and checkpoints
//! after every batch so sessions can be paused and resumed.

pub mod config;
pub mod extract;
pub mod lookup;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod runner;
pub mod schema;
