//! SWC plugin entry, built with the `plugin` feature.

use std::sync::{Mutex, OnceLock};

use swc_core::{
    ecma::ast::Program,
    plugin::{
        metadata::TransformPluginMetadataContextKind, plugin_transform,
        proxies::TransformPluginProgramMetadata,
    },
};

use crate::config::TrackingOptions;
use crate::instrument::{transform_module, TransformContext};
use crate::manifest::{normalize_path, ManifestEmitter};
use crate::registry::{DuplicateRegistry, SharedRegistry};
use crate::session::record_manifest;

// One registry per plugin instance; the host keeps the instance for the build.
static REGISTRY: OnceLock<Mutex<DuplicateRegistry>> = OnceLock::new();

fn options(metadata: &TransformPluginProgramMetadata) -> TrackingOptions {
    let Some(raw) = metadata.get_transform_plugin_config() else {
        return TrackingOptions::default();
    };
    TrackingOptions::from_json(&raw).unwrap_or_else(|err| {
        log::warn!("[tracking] {}; using defaults", err);
        TrackingOptions::default()
    })
}

#[plugin_transform]
pub fn process_transform(program: Program, metadata: TransformPluginProgramMetadata) -> Program {
    let module = match program {
        Program::Module(module) => module,
        script => return script,
    };
    let options = options(&metadata);
    let file = metadata
        .get_context(&TransformPluginMetadataContextKind::Filename)
        .map(|name| normalize_path(&name))
        .unwrap_or_else(|| "unknown".to_string());

    let mut registry = SharedRegistry(REGISTRY.get_or_init(Default::default));
    let output = transform_module(
        module,
        TransformContext {
            file_path: &file,
            options: &options,
            registry: &mut registry,
            source_map: Some(&metadata.source_map),
        },
    );

    if options.emit_manifests {
        let emitter = ManifestEmitter::new(&options.tracking_dir, false);
        output
            .diagnostics
            .iter()
            .chain(record_manifest(&emitter, &file, &output.tracking_points).iter())
            .for_each(|d| d.log());
    } else {
        output.diagnostics.iter().for_each(|d| d.log());
    }

    Program::Module(output.module)
}
