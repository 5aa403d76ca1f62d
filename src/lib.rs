#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod backend;
pub mod cli;
pub mod config;
pub mod create;
pub mod error;
pub mod flow;
pub mod iso;
pub mod lifecycle;
pub mod logging;
pub mod packages;
pub mod paths;
pub mod progress;
pub mod resolver;
pub mod screen;
pub mod settings;
pub mod topology;
pub mod util;
