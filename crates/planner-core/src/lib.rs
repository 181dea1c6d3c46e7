//! # planner-core: shared data model for the production planner
//!
//! This crate provides the data types, calendar arithmetic, error handling,
//! and diagnostics infrastructure shared by every stage of the pipeline: the
//! Input Normalizer, the Feasibility Estimator, the Main Scheduler, the
//! Type-R Specialized Scheduler, and the Plan Assembler (all implemented in
//! `planner-algo`).
//!
//! ## Design Philosophy
//!
//! Scheduling code is easiest to get wrong at the boundaries: mixing a day
//! offset with a month index, forgetting a shelf-life edge case, or
//! re-parsing an adjacency rule from a string deep inside a hot loop. This
//! crate pushes those concerns to the edges:
//!
//! - [`units`]: newtype wrappers (`Day`, `Grams`, `MonthIndex`, ...) so the
//!   type system catches unit mix-ups.
//! - [`model`]: the normalized domain model (`ProductConfig`, `LineConfig`,
//!   `Run`, ...), with adjacency already parsed into [`model::OverlapRule`]
//!   rather than left as strings.
//! - [`calendar`]: the only place day offsets cross back into calendar dates.
//! - [`error`]: a single [`PlannerError`] enum for the fatal error kinds in §7.
//! - [`diagnostics`]: a collector for the non-fatal issues in §7 (e.g. a
//!   product skipped for having no active lines).
//!
//! ## Example
//!
//! ```
//! use planner_core::model::{DemandPoint};
//! use planner_core::units::{Grams, MonthIndex};
//!
//! let demand = DemandPoint { month: MonthIndex(1), grams: Grams(500) };
//! assert_eq!(demand.grams, Grams(500));
//! ```

pub mod calendar;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod units;

pub use diagnostics::{Diagnostics, ImportDiagnostics, Severity};
pub use error::{PlannerError, PlannerResult};
pub use model::{
    BrStageConfig, DemandPoint, FollowUpSet, FollowUpStageConfig, InventoryPoint, LineConfig,
    OverlapRule, ProductConfig, Run, SameStartGroup, StageKind, StageSpan,
};
pub use units::{Day, Grams, Liters, MonthIndex, DAYS_PER_MONTH, MAX_DAY_OFFSET, MIN_DAY_OFFSET};
