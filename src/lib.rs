//! Characterization and synthetic replay of application-level network traffic.
//!
//! A captured flow (a table of timestamps and packet sizes) goes through four stages:
//! - [`clustering`] splits it into sub-flows according to packet sizes,
//! - [`models`] describes each sub-flow with statistics or empirical distributions,
//! - [`generation`] synthesizes a new trace from these models, one worker per sub-flow,
//! - [`validation`] measures how close the synthetic trace is to the original one.

pub mod clustering;
pub mod config;
pub mod error;
pub mod export;
pub mod generation;
pub mod models;
pub mod structs;
pub mod validation;

pub use error::{Error, Result};
