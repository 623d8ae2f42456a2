/// Collector module
///
/// This module groups the orchestration logic between the site
/// collectors and the merge step:
/// - `task`: one source's unit of work and its row normalization
/// - `pool`: bounded concurrent execution with per-task isolation
///
/// Design notes:
/// - Site-specific logic MUST NOT live here (see `sources`)
/// - Tasks never share mutable state; the pool is the only
///   aggregation point
pub mod pool;
pub mod task;
