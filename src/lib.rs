// src/lib.rs

//! top1000 feed ingestion library
//!
//! Fetches the IYUU top1000 plaintext feed, parses it into site records and
//! publishes the result as a JSON snapshot that doubles as the read API.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
