pub mod convert;
pub mod interval;
pub mod pairwise;
