//! # planner-cli: command-line front end for the production planner
//!
//! Thin glue over [`planner_algo`]: reads a planning request file, runs the
//! pipeline in [`commands`], and prints the result. All scheduling logic
//! lives in `planner-core`/`planner-algo`; this crate is I/O and formatting
//! only (§1 "Out of scope": persistence, configuration loading, logging are
//! the caller's concern generally, but a CLI still needs basic file I/O and
//! a logging setup to be usable standalone).

pub mod cli;
pub mod commands;
