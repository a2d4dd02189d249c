//! Controller for CondorCluster records
//!
//! Each pass ensures the derived objects exist, in order, and reports when the
//! record should be looked at again. There is no status bookkeeping; the pass
//! is safe to repeat indefinitely.

mod cluster;

pub use cluster::{build_entrypoint_config_map, error_policy, reconcile, Context, ContextBuilder};
