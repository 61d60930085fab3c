//! Library side of the `icu-features` command line tool.

pub mod config;
pub mod logging;
pub mod run;
