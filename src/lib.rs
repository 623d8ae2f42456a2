// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// - config:    Configuration structs loaded from JSON
// - schema:    Listing, result and table types
// - error:     Typed failure taxonomy
// - util:      Link resolution, title cleanup, dates
// - events:    Structured run events and their single consumer
// - metrics:   Process-wide counters
// - sources:   Site collectors and the name → collector registry
// - collector: SourceTask and the bounded TaskPool
// - merge:     Union of successful sources into one table
// - sink:      CSV snapshot and batched relational load
// - pipeline:  One collect → merge → commit pass
//
pub mod collector;
pub mod config;
pub mod error;
pub mod events;
pub mod merge;
pub mod metrics;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod sources;
pub mod util;
