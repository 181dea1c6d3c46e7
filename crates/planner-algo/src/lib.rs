//! # planner-algo: production scheduling algorithms
//!
//! This crate implements the pipeline that turns normalized demand and line
//! configuration into a production plan:
//!
//! 1. [`normalize`] — Input Normalizer: raw JSON config → [`planner_core::model`] types.
//! 2. [`feasibility`] — Feasibility Estimator: a cheap bound on whether demand
//!    is even theoretically satisfiable before the expensive solve.
//! 3. [`stages`] — deterministic per-line stage-graph construction, shared by
//!    both schedulers.
//! 4. [`scheduler`] — Main Scheduler: a deterministic greedy constructive
//!    search that places runs on lines subject to no-overlap and monthly
//!    demand constraints.
//! 5. [`typer`] — Type-R Specialized Scheduler: a simpler fixed-chain
//!    placement pass for the Type-R product family.
//! 6. [`assembler`] — Plan Assembler: adds preparation pre-stages, computes
//!    release days, and builds the shelf-life-aware inventory trajectory.
//!
//! The Feasibility Estimator is the only stage backed by an actual LP solve,
//! via [`good_lp`] against the pure-Rust `microlp` backend. The schedulers
//! place runs greedily rather than via MILP — see [`scheduler`]'s module
//! doc for why.

pub mod assembler;
pub mod feasibility;
pub mod normalize;
pub mod pipeline;
pub mod scheduler;
pub mod stages;
pub mod typer;

pub use assembler::{assemble_plan, Plan};
pub use feasibility::{estimate_feasibility, FeasibilityReport};
pub use normalize::{normalize, DemandEntry, NormalizedInput, RawPlanningInput};
pub use pipeline::{run_pipeline, PlanningResult};
pub use scheduler::{schedule_main, ObjectiveWeights};
pub use stages::{build_line_stage_graph, LineStageGraph, TimingRule};
pub use typer::schedule_type_r;
