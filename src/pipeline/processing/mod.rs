// Pipeline processing: raw export cleaning and aggregate derivation

pub mod normalize;
