//! Entity models for the tenancy metadata schema.

pub mod tenant;
