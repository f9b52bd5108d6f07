pub mod controller;
pub mod error;
pub mod mutation;
pub mod patch;
pub mod resource;
pub mod review;
pub mod scheme;

pub use controller::{AdmissionController, Outcome, UnmatchedPolicy};
pub use error::{Error, Result};
pub use scheme::Scheme;
