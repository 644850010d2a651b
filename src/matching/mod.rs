// src/matching/mod.rs
pub mod comparators;
pub mod contrast;
pub mod name;
pub mod values;

pub use comparators::{Comparator, ComparatorRegistry};
pub use contrast::{ContrastOutput, ContrastStats, PairContraster};
