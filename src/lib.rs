// src/lib.rs

//! sitewatch: keyword and change monitoring for web pages

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(feature = "lambda")]
pub mod handler;
