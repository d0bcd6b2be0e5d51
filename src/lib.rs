//! Build-time instrumentation for declarative tracking markers.
//!
//! JSX elements carrying `data-track-show="name"` or `data-track-click="name"`
//! are rewritten: the markers are removed, the element gets a generated
//! `trackingRefN` ref, and the enclosing component gets hooks that report a
//! click on every click and a show the first time at least 10% of the element
//! is visible. Each file with tracking points gets a JSON manifest, and a
//! summary of all manifests is kept next to them.
//!
//! ```jsx
//! <button data-track-click="signup">Sign up</button>
//! // becomes
//! <button ref={trackingRef0}>Sign up</button>
//! ```
//!
//! Hosts either hand over source text through [`BuildSession::transform_source`]
//! or run as an SWC plugin (`plugin` feature).

mod ast;
mod click;
pub mod config;
pub mod diagnostics;
pub mod error;
mod handle;
mod imports;
pub mod instrument;
pub mod manifest;
mod marker;
pub mod model;
mod placement;
pub mod registry;
pub mod session;
pub mod source;
mod visibility;

#[cfg(feature = "plugin")]
pub mod plugin;

#[cfg(test)]
mod pipeline_tests;

pub use config::TrackingOptions;
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity};
pub use error::{Result, TrackingError};
pub use instrument::{transform_module, ModuleOutput, TransformContext};
pub use manifest::{Manifest, ManifestEmitter, Summary};
pub use model::{ElementHandle, MarkerKind, MarkerValue, TrackingMarker, TrackingPoint};
pub use registry::{DuplicateRegistry, Registration, SharedRegistry, TrackingRegistry};
pub use session::{BuildSession, TransformResult};
pub use visibility::VISIBILITY_THRESHOLD;
