//! Transformation plans and their execution
//!
//! ```text
//! TransformationPlan (untrusted JSON)
//!     └─ validate ──▶ Vec<Operation>
//!            └─ apply_operation (working copy) ──▶ rows + modification count
//!                   └─ TransformationRunner ──▶ next DatasetSnapshot
//! ```

pub mod dates;
pub mod executor;
pub mod filter;
pub mod operation;
pub mod runner;

pub use executor::{ApplyContext, FILL_PLACEHOLDER, RangePolicy, apply_operation};
pub use filter::{FilterOp, RowFilter};
pub use operation::{
    CellTarget, Operation, OperationKind, OperationSpec, RowSelection, TransformationPlan,
};
pub use runner::{DEFAULT_CHANGE_DESCRIPTION, TransformationOutcome, TransformationRunner};
