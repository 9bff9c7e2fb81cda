pub mod accessors;
pub mod error;
pub mod invariants;
pub mod misc;
pub mod mutators;
pub mod predicates;
pub mod verifier;
