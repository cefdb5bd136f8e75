//! File actions module.
//!
//! - [`policy`] turns duplicate groups and deletion masks into a
//!   [`DeletionPlan`]
//! - [`delete`] executes a plan, permanently or via the system trash
//!
//! ```
//! use dupsweep::actions::{plan_deletions, DeletionPlan};
//! use dupsweep::mask::MaskMatcher;
//!
//! let plan = plan_deletions(&[], &["*/backup/*"], false, &MaskMatcher::new());
//! assert_eq!(plan, DeletionPlan::default());
//! ```

pub mod delete;
pub mod policy;

pub use delete::{
    delete_to_trash, delete_verified, execute, permanent_delete, BatchDeleteResult,
    DeleteConfig, DeleteError, DeleteResult,
};
pub use policy::{plan_deletions, DeletionPlan, PlannedDeletion};
