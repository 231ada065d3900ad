//! debug-shell - an enhanced interactive debugger shell
//!
//! Wraps a host execution engine (consumed through the [`tracer::Tracer`]
//! boundary) with an interactive session: colorized stack display, a
//! "sticky" full-screen source view, merged tab-completion from two
//! completion providers, hidden-frame filtering, and a smart
//! command/variable disambiguator. Repeated break requests reuse one
//! session through the [`session::registry::SessionRegistry`] instead of
//! nesting.

pub mod common;
pub mod complete;
pub mod frames;
pub mod input;
pub mod render;
pub mod session;
pub mod testing;
pub mod tracer;

pub use common::{Config, Error, Result};
pub use session::registry::{Acquired, SessionRegistry};
pub use session::{
    break_here, post_mortem, post_mortem_with_traceback, CompleterFactory, OutputSink, Session,
    SessionBuilder, SessionRef,
};
pub use tracer::{Resume, StopEvent, StopKind, Tracer, TracerRef};
