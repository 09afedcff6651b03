//! Incremental markup handling for streamed assistant responses.
//!
//! An assistant turn arrives token by token, so at any point the accumulated
//! text may be an unfinished prefix of a chart markup fragment. These modules
//! decide, on every snapshot of that text, whether the response carries
//! embedded markup, split the prose explanation from the markup payload, and
//! repair a truncated payload so it stays renderable while the rest of the
//! stream arrives.
//!
//! Everything here is a pure function of its input: each call re-derives its
//! answer from the full snapshot rather than threading parse state across
//! chunks. Repeated or out-of-order invocations with growing snapshots are
//! therefore harmless.

pub mod balancer;
pub mod classifier;
pub mod scanner;

pub use balancer::balance;
pub use classifier::{CHART_CONTAINER_TAGS, Classification, classify};
pub use scanner::{TagKind, TagToken, next_tag};
