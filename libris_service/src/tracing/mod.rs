//! Tracing and observability.

pub mod tracer;
