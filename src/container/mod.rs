mod fast_set;

pub use fast_set::FastSet;
