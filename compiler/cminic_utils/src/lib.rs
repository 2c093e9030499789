//! Small index-keyed collections shared by every later crate in the
//! workspace. Nothing here is specific to compiling C — it is the same
//! kind of low-level scaffolding a rustc-style compiler leans on so that
//! `LocalId`, `GlobalId`, `FuncId`, and `StrId` can never be swapped for
//! each other by accident.

pub mod idx;
pub mod index_slice;
pub mod index_vec;
pub mod log_macros;
