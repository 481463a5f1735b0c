#![forbid(unsafe_code)]

pub mod bronze;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod formats;
pub mod gold;
pub mod http;
pub mod images;
pub mod logging;
pub mod object_store;
pub mod pipeline;
pub mod run;
pub mod silver;
pub mod transform;
