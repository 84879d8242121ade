pub mod filter;
pub mod harvest;
pub mod normalize;
