//! Database operations for voxide-ta

pub mod job_sets;
