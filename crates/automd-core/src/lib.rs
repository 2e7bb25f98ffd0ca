//! Core library of automd-rs: orchestration of GROMACS molecular-dynamics
//! runs for isomer searching, from configuration regularization through
//! topology generation, staged engine execution and output extraction.

pub mod config;
pub mod domain;
pub mod engine;
pub mod formats;
pub mod modules;
pub mod pipeline;
pub mod process;
pub mod units;
