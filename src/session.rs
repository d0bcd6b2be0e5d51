//! Build-wide state and the text-in/text-out entry point.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use swc_core::common::{Globals, SourceMapper, GLOBALS};
use swc_core::ecma::ast::Module;

use crate::config::TrackingOptions;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Severity};
use crate::error::{Result, TrackingError};
use crate::instrument::{transform_module, ModuleOutput, TransformContext};
use crate::manifest::{normalize_path, ManifestEmitter};
use crate::model::TrackingPoint;
use crate::registry::{DuplicateRegistry, SharedRegistry};
use crate::source::parse_module;

/// Result of transforming one file's source text.
#[derive(Debug, Clone)]
pub struct TransformResult {
    /// Rewritten source, or the input unchanged when nothing was rewritten.
    pub code: String,
    pub diagnostics: Vec<Diagnostic>,
    pub tracking_points: Vec<TrackingPoint>,
    pub instrumented: bool,
}

/// One build: options, the duplicate registry and the manifest writer.
///
/// Safe to share across threads. Registry entries live until [`reset`] is
/// called; a file recompiled within the same session therefore reports its
/// own keys as duplicates.
///
/// [`reset`]: BuildSession::reset
pub struct BuildSession {
    options: TrackingOptions,
    registry: Mutex<DuplicateRegistry>,
    emitter: ManifestEmitter,
}

impl BuildSession {
    pub fn new(options: TrackingOptions) -> Self {
        let emitter = ManifestEmitter::new(&options.tracking_dir, options.output_transformed_files);
        Self {
            options,
            registry: Mutex::new(DuplicateRegistry::new()),
            emitter,
        }
    }

    pub fn options(&self) -> &TrackingOptions {
        &self.options
    }

    pub fn emitter(&self) -> &ManifestEmitter {
        &self.emitter
    }

    /// Forget all registered keys, e.g. at the start of a full rebuild.
    pub fn reset(&self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
        log::debug!("[tracking] registry reset");
    }

    /// Transform an already parsed module against this session's registry.
    pub fn transform_module(
        &self,
        module: Module,
        file_path: &str,
        source_map: Option<&dyn SourceMapper>,
    ) -> ModuleOutput {
        let mut registry = SharedRegistry(&self.registry);
        transform_module(
            module,
            TransformContext {
                file_path,
                options: &self.options,
                registry: &mut registry,
                source_map,
            },
        )
    }

    fn rewrite(&self, source: &str, file_path: &str) -> Result<(String, ModuleOutput)> {
        let (module, cx) = parse_module(source, file_path)?;
        let output = self.transform_module(module, file_path, Some(&*cx.source_map));
        if !output.instrumented {
            return Ok((source.to_string(), output));
        }
        let code = cx.print_module(&output.module, file_path)?;
        Ok((code, output))
    }

    /// Transform one file. Never fails: on any error the original source is
    /// returned with a `transform-failed` diagnostic.
    pub fn transform_source(&self, source: &str, file_path: &str) -> TransformResult {
        let file = normalize_path(file_path);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            GLOBALS.set(&Globals::new(), || self.rewrite(source, &file))
        }));
        let failure = match outcome {
            Ok(Ok((code, output))) => return self.finish(&file, code, output),
            Ok(Err(err)) => err,
            Err(payload) => TrackingError::Panicked {
                file: file.clone(),
                message: panic_message(payload.as_ref()),
            },
        };

        let diagnostic = Diagnostic::new(
            Severity::Error,
            DiagnosticCode::TransformFailed,
            &file,
            format!("{}; file left untransformed", failure),
        );
        diagnostic.log();
        TransformResult {
            code: source.to_string(),
            diagnostics: vec![diagnostic],
            tracking_points: vec![],
            instrumented: false,
        }
    }

    fn finish(&self, file: &str, code: String, output: ModuleOutput) -> TransformResult {
        let ModuleOutput {
            tracking_points,
            mut diagnostics,
            instrumented,
            ..
        } = output;

        if self.options.emit_manifests {
            diagnostics.extend(record_manifest(&self.emitter, file, &tracking_points));
            if instrumented {
                if let Err(err) = self.emitter.write_transformed(file, &code) {
                    diagnostics.push(manifest_io(file, err));
                }
            }
        }
        for d in &diagnostics {
            d.log();
        }

        TransformResult {
            code,
            diagnostics,
            tracking_points,
            instrumented,
        }
    }
}

fn manifest_io(file: &str, err: TrackingError) -> Diagnostic {
    Diagnostic::warning(DiagnosticCode::ManifestIo, file, err.to_string())
}

/// Write or retract the manifest for `file`. A failed write is reported and
/// otherwise ignored.
pub(crate) fn record_manifest(
    emitter: &ManifestEmitter,
    file: &str,
    points: &[TrackingPoint],
) -> Option<Diagnostic> {
    let written = if points.is_empty() {
        emitter.retract(file).map(|removed| {
            if removed {
                log::info!("[tracking] removed stale manifest for {}", file);
            }
        })
    } else {
        emitter.emit(file, points).map(drop)
    };
    written.err().map(|err| manifest_io(file, err))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
