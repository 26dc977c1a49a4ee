//! Helpers shared by population nodes and matrix updaters

mod hash_field_mask;
mod matrix;
mod virtual_people_selector;

pub use hash_field_mask::HashFieldMaskMatcher;
pub use matrix::{ColumnMatcher, MatrixIndexes};
pub use virtual_people_selector::VirtualPeopleSelector;
