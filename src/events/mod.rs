mod coordination;
mod die;

pub use coordination::{coordination_test, contingency_table, CoordinationParams, EventPairTest, TestKind};
pub use die::{die_test, DieResult, IsoformIndex};
