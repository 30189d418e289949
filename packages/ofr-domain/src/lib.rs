pub mod guardrail;
pub mod intent;
pub mod offer;
pub mod tokenize;

pub use offer::{Category, ConstraintSet, EligibilityTier, Item, SortMode};
