/// Collector module
///
/// This module decides when enough payloads have arrived:
/// - `runner`:  the policy loop driving a `PayloadSource`
/// - `batches`: batch bookkeeping for batch-bound collection
///
/// Design notes:
/// - Transport details MUST NOT live here; the collector only
///   sees the `PayloadSource` trait
/// - Naming and disk output run after the collector returns
pub mod batches;
pub mod runner;

pub use runner::{Collector, Policy};
