//! Queue and sink test suites

mod sink;
