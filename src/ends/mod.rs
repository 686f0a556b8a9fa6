mod unify;

pub use unify::{unify_ends, UnifyParams};
