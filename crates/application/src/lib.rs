//! Application services and ports for query-field resolution.

#![forbid(unsafe_code)]

mod query_field_service;
mod tracking_ports;

pub use query_field_service::{QueryFieldResolver, QueryFieldService};
pub use tracking_ports::{
    RecordOrder, RecordQuery, SummaryFieldSpec, SummaryReport, TrackingClient,
};
