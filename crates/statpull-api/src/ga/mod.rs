// Google Analytics client modules
//
// Core Reporting v3 (`data/ga`), Reporting v4 (`reports:batchGet`) and the
// Management API, all behind one OAuth-authenticated `AnalyticsClient`.

pub mod client;
pub mod management;
pub mod types;
pub mod v3;
pub mod v4;

pub use client::{AnalyticsClient, GaEndpoints};
pub use v3::{DayResult, V3Query, split_outcomes};
pub use v4::V4Request;
