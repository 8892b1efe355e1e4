pub mod maps;
pub mod predicates;
pub mod reduces;
pub mod sources;

// Only re-export the call-site vocabulary; traits stay addressable by path.
pub use maps::{explode_ar, merge_ar};
pub use predicates::{eq, gt, lt, p_and, p_not, p_or, tautology};
pub use reduces::{bi_fold, count, every_col2, every_col3, per_col2, per_col3, pred_fold, sum};
pub use sources::{from_mem, FromMem};
