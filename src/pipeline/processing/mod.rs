// Pipeline stages in run order: parsing, cargo decomposition, deduplication, normalization

pub mod parser;
pub mod cargo;
pub mod dedup;
pub mod normalize;
