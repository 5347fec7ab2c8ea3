//! Shared helpers for voxide-ta

pub mod db_retry;
