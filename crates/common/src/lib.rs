// tripline-common: shared types and wire protocols for the Tripline workspace

pub mod protocol;
pub mod types;
