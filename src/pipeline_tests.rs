use std::fs;
use std::path::Path;

use crate::config::TrackingOptions;
use crate::diagnostics::{DiagnosticCode, Severity};
use crate::model::MarkerKind;
use crate::session::BuildSession;

const RUNTIME_IMPORT: &str = "import \"http://localhost:3000/tracking.js\";";

fn session(dir: &Path) -> BuildSession {
    BuildSession::new(TrackingOptions {
        tracking_dir: dir.to_path_buf(),
        ..Default::default()
    })
}

fn no_manifests() -> BuildSession {
    BuildSession::new(TrackingOptions {
        emit_manifests: false,
        ..Default::default()
    })
}

fn position(code: &str, needle: &str) -> usize {
    code.find(needle)
        .unwrap_or_else(|| panic!("`{}` not found in:\n{}", needle, code))
}

const AD_PAGE: &str = r#"import React from "react";

export default function Page() {
  return (
    <main>
      <div className="ad" data-track-show="ad" data-track-click="ad">
        Ad
      </div>
    </main>
  );
}
"#;

#[test]
fn show_and_click_on_one_element() {
    let dir = tempfile::tempdir().unwrap();
    let result = session(dir.path()).transform_source(AD_PAGE, "src/Page.tsx");

    assert!(result.instrumented);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let kinds: Vec<MarkerKind> = result.tracking_points.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![MarkerKind::Show, MarkerKind::Click]);

    let code = &result.code;
    assert!(!code.contains("data-track"));
    assert!(code.contains("ref={trackingRef0}"));
    assert!(code.contains("className=\"ad\""));
    assert!(code.contains("window.tracking.show(\"ad\")"));
    assert!(code.contains("window.tracking.click(\"ad\")"));
    assert!(code.contains("new IntersectionObserver("));
    assert!(code.contains("threshold: 0.1"));
    assert!(code.contains("useRef as __useTrackingRef"));

    assert!(position(code, "import React") < position(code, RUNTIME_IMPORT));
    assert!(position(code, RUNTIME_IMPORT) < position(code, "__useTrackingCallback"));
    assert!(position(code, "__useTrackingRef(null)") < position(code, "return"));

    let raw = fs::read_to_string(dir.path().join("Page-tracking.json")).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(manifest["file"], "src/Page.tsx");
    assert_eq!(
        manifest["tracking"],
        serde_json::json!([
            { "type": "show", "name": "ad", "elementName": "div" },
            { "type": "click", "name": "ad", "elementName": "div" }
        ])
    );
}

#[test]
fn output_is_stable_when_transformed_again() {
    let once = no_manifests().transform_source(AD_PAGE, "src/Page.tsx");
    let twice = no_manifests().transform_source(&once.code, "src/Page.tsx");
    assert!(!twice.instrumented);
    assert!(twice.diagnostics.is_empty());
    assert_eq!(twice.code, once.code);
    assert_eq!(twice.code.matches(RUNTIME_IMPORT).count(), 1);
}

#[test]
fn files_without_markers_pass_through() {
    let dir = tempfile::tempdir().unwrap();
    let src = "import React from 'react';\n\n// plain\nexport const A = () => <div   className='x' />;\n";
    let result = session(dir.path()).transform_source(src, "src/Plain.tsx");
    assert!(!result.instrumented);
    assert_eq!(result.code, src);
    assert!(result.tracking_points.is_empty());
    assert!(!dir.path().join("Plain-tracking.json").exists());
    assert!(!dir.path().join("tracking-summary.json").exists());
}

#[test]
fn duplicate_across_files_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    let session = session(dir.path());
    let a = "export function A() { return <button data-track-click=\"buy\">Buy</button>; }";
    let b = "export function B() { return <a data-track-click=\"buy\">Buy</a>; }";

    let first = session.transform_source(a, "src/A.tsx");
    assert!(first.diagnostics.is_empty());
    let second = session.transform_source(b, "src/B.tsx");
    assert_eq!(second.diagnostics.len(), 1);
    let d = &second.diagnostics[0];
    assert_eq!(d.code, DiagnosticCode::DuplicateKey);
    assert_eq!(d.severity, Severity::Warning);
    assert!(d.message.contains("click:buy"));
    assert!(d.message.contains("src/A.tsx <button>"));
    assert!(d.message.contains("src/B.tsx <a>"));

    assert!(second.instrumented);
    assert!(second.code.contains("window.tracking.click(\"buy\")"));
    assert!(dir.path().join("B-tracking.json").exists());
    let summary = session.emitter().read_summary().unwrap();
    assert_eq!(summary.files.len(), 2);
    assert_eq!(summary.total_tracking, 2);
}

#[test]
fn dynamic_markers_are_not_duplicates() {
    let session = no_manifests();
    let src = "export function Item({ item }) { return <li data-track-click={item.id}>{item.label}</li>; }";
    let a = session.transform_source(src, "src/A.jsx");
    let b = session.transform_source(src, "src/B.jsx");
    assert!(a.diagnostics.is_empty());
    assert!(b.diagnostics.is_empty());
    assert_eq!(b.tracking_points[0].name, "dynamic");
    assert!(b.code.contains("window.tracking.click(item.id)"));
}

#[test]
fn same_name_different_kind_is_not_a_duplicate() {
    let session = no_manifests();
    let a = session.transform_source("export const A = () => <div data-track-show=\"hero\" />;", "a.tsx");
    let b = session.transform_source("export const B = () => <div data-track-click=\"hero\" />;", "b.tsx");
    assert!(a.diagnostics.is_empty());
    assert!(b.diagnostics.is_empty());
}

#[test]
fn elements_get_distinct_handles_in_document_order() {
    let src = r#"export function List() {
  return (
    <ul data-track-show="list">
      <li data-track-click="first">1</li>
      <li data-track-click="second">2</li>
    </ul>
  );
}"#;
    let result = no_manifests().transform_source(src, "src/List.tsx");
    let names: Vec<&str> = result.tracking_points.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["list", "first", "second"]);
    assert!(position(&result.code, "<ul ref={trackingRef0}") < position(&result.code, "<li ref={trackingRef1}"));
    assert!(result.code.contains("<li ref={trackingRef2}"));
    assert_eq!(result.code.matches(RUNTIME_IMPORT).count(), 1);
}

#[test]
fn expression_bodied_arrow_becomes_a_block() {
    let result = no_manifests().transform_source(
        "export const Card = () => <div data-track-click=\"card\" />;",
        "src/Card.tsx",
    );
    assert!(result.code.contains("return <div ref={trackingRef0}"));
    assert!(position(&result.code, "__useTrackingRef(null)") < position(&result.code, "return <div"));
}

#[test]
fn existing_ref_is_forwarded() {
    let src = "export function Box() { const boxRef = useRef(null); return <div ref={boxRef} data-track-show=\"box\" />; }";
    let result = no_manifests().transform_source(src, "src/Box.tsx");
    assert!(result.diagnostics.is_empty());
    assert!(result.code.contains("trackingRef0.current = __trackingNode"));
    assert!(result.code.contains("const __forwardRef = boxRef"));
    assert!(!result.code.contains("ref={trackingRef0}"));
}

#[test]
fn module_level_jsx_is_stripped_without_instrumentation() {
    let result = no_manifests().transform_source(
        "export const banner = <div data-track-show=\"banner\" />;",
        "src/banner.tsx",
    );
    assert!(result.tracking_points.is_empty());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::UnsupportedPlacement);
    assert_eq!(result.diagnostics[0].line, Some(1));
    assert!(!result.code.contains("data-track"));
    assert!(!result.code.contains("tracking.js"));
}

#[test]
fn class_components_are_unsupported() {
    let src = r#"class Legacy extends React.Component {
  render() {
    return <div data-track-show="legacy" />;
  }
}"#;
    let result = no_manifests().transform_source(src, "src/Legacy.jsx");
    assert!(result.tracking_points.is_empty());
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::UnsupportedPlacement);
    assert!(!result.code.contains("trackingRef"));
}

#[test]
fn marker_without_value_is_removed() {
    let result = no_manifests().transform_source(
        "export const A = () => <div data-track-show />;",
        "src/A.tsx",
    );
    assert!(result.tracking_points.is_empty());
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::MissingMarkerValue);
    assert!(!result.code.contains("data-track"));
}

#[test]
fn nested_render_callbacks_share_a_handle() {
    let src = r#"export function Rows({ rows }) {
  return <ul>{rows.map((r) => <li key={r} data-track-click="row">{r}</li>)}</ul>;
}"#;
    let result = no_manifests().transform_source(src, "src/Rows.tsx");
    assert_eq!(result.tracking_points.len(), 1);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::SharedHandle);
    assert_eq!(result.diagnostics[0].severity, Severity::Note);
    assert!(position(&result.code, "__useTrackingRef(null)") < position(&result.code, "rows.map"));
}

#[test]
fn nested_callbacks_may_use_component_bindings() {
    let src = r#"export function Rows({ rows, section }) {
  return <ul>{rows.map((r) => <li key={r} data-track-click={section}>{r}</li>)}</ul>;
}"#;
    let result = no_manifests().transform_source(src, "src/Rows.tsx");
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::SharedHandle);
    assert!(result.code.contains("window.tracking.click(section)"));
}

#[test]
fn nested_callback_bindings_are_unsupported() {
    let src = r#"export function Rows({ rows }) {
  return <ul>{rows.map((r) => <li key={r.id} data-track-click={r.id}>{r.label}</li>)}</ul>;
}"#;
    let result = no_manifests().transform_source(src, "src/Rows.tsx");
    assert!(result.tracking_points.is_empty());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::UnsupportedPlacement);
    assert!(result.diagnostics[0].message.contains("`r`"));
    assert!(!result.code.contains("trackingRef"));
}

#[test]
fn hooks_run_before_an_early_return() {
    let src = r#"export function Banner({ show }) {
  if (!show) return null;
  return <div data-track-click="banner" />;
}"#;
    let result = no_manifests().transform_source(src, "src/Banner.tsx");
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert!(position(&result.code, "__useTrackingRef(null)") < position(&result.code, "if (!show)"));
    assert!(position(&result.code, "__useTrackingCallback(") < position(&result.code, "if (!show)"));
}

#[test]
fn dynamic_hooks_follow_the_bindings_they_use() {
    let src = r#"export function Item({ item }) {
  const label = item.label;
  if (!label) return null;
  return <li data-track-click={label}>{label}</li>;
}"#;
    let result = no_manifests().transform_source(src, "src/Item.tsx");
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let hooks = position(&result.code, "__useTrackingRef(null)");
    assert!(position(&result.code, "const label") < hooks);
    assert!(hooks < position(&result.code, "if (!label)"));
    assert!(result.code.contains("window.tracking.click(label)"));
}

#[test]
fn dynamic_values_declared_after_an_exit_are_unsupported() {
    let src = r#"export function Item({ item }) {
  if (!item) return null;
  const label = item.label;
  return <li data-track-click={label} />;
}"#;
    let result = no_manifests().transform_source(src, "src/Item.tsx");
    assert!(result.tracking_points.is_empty());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::UnsupportedPlacement);
    assert!(result.diagnostics[0].message.contains("`label`"));
    assert!(!result.code.contains("data-track"));
    assert!(!result.code.contains("tracking.js"));
}

#[test]
fn wrapper_factories_instrument_the_returned_component() {
    let src = r#"export function withAd(Component) {
  return function Wrapped(props) {
    return <div data-track-show="wrapped"><Component {...props} /></div>;
  };
}"#;
    let result = no_manifests().transform_source(src, "src/withAd.tsx");
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert!(position(&result.code, "function Wrapped") < position(&result.code, "__useTrackingRef(null)"));
}

#[test]
fn plain_functions_are_not_components() {
    let result = no_manifests().transform_source(
        "export function renderAd() { return <div data-track-show=\"ad\" />; }",
        "src/render.tsx",
    );
    assert!(result.tracking_points.is_empty());
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::UnsupportedPlacement);
    assert!(result.diagnostics[0].message.contains("not inside a function component"));
}

#[test]
fn memo_and_forward_ref_bodies_are_components() {
    let src = r#"export const Ad = memo(function () {
  return <div data-track-click="memo" />;
});
export default React.forwardRef((props, ref) => <input ref={ref} data-track-click="input" />);
"#;
    let result = no_manifests().transform_source(src, "src/Ad.tsx");
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let names: Vec<&str> = result.tracking_points.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["memo", "input"]);
    assert!(result.code.contains("const __forwardRef = ref"));
}

#[test]
fn spread_props_refs_are_forwarded() {
    let src = "export function Field(props) { return <input {...props} data-track-click=\"field\" />; }";
    let result = no_manifests().transform_source(src, "src/Field.tsx");
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert!(result.code.contains("const __forwardRef = props.ref"));
    assert!(position(&result.code, "{...props}") < position(&result.code, "__trackingNode"));
}

#[test]
fn spreads_after_an_explicit_ref_take_precedence() {
    let src = "export function Box({ boxRef, rest }) { return <div ref={boxRef} {...rest} data-track-show=\"box\" />; }";
    let result = no_manifests().transform_source(src, "src/Box.tsx");
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert!(result.code.contains("const __forwardRef = rest.ref ?? boxRef"));
}

#[test]
fn computed_spreads_are_unsupported() {
    let src = "export function Box() { return <div {...getProps()} data-track-show=\"box\" />; }";
    let result = no_manifests().transform_source(src, "src/Box.tsx");
    assert!(result.tracking_points.is_empty());
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::UnsupportedPlacement);
    assert!(result.diagnostics[0].message.contains("spreads"));
    assert!(result.code.contains("{...getProps()}"));
}

#[test]
fn rerendering_the_same_node_observes_it_once() {
    let code = no_manifests().transform_source(AD_PAGE, "src/Page.tsx").code;
    let guard = position(&code, "__trackingState.element === __trackingElement");
    let observer = position(&code, "new IntersectionObserver(");
    assert!(guard < observer);
    assert!(code[guard..observer].contains("return;"));
    assert_eq!(code.matches("new IntersectionObserver(").count(), 1);
}

#[test]
fn generated_names_skip_existing_bindings() {
    let src = "const trackingRef0 = 1;\nexport const A = () => <div data-track-show=\"a\" />;";
    let result = no_manifests().transform_source(src, "src/A.tsx");
    assert!(result.code.contains("ref={trackingRef1}"));
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::HandleCollision);
}

#[test]
fn runtime_import_is_not_duplicated() {
    let src = "import \"http://localhost:3000/tracking.js\";\nexport const A = () => <div data-track-show=\"a\" />;";
    let result = no_manifests().transform_source(src, "src/A.tsx");
    assert_eq!(result.code.matches("tracking.js").count(), 1);
}

#[test]
fn directives_stay_first() {
    let src = "\"use client\";\nexport const A = () => <div data-track-show=\"a\" />;";
    let result = no_manifests().transform_source(src, "src/A.tsx");
    assert!(result.code.trim_start().starts_with("\"use client\""));
    assert!(position(&result.code, "use client") < position(&result.code, RUNTIME_IMPORT));
}

#[test]
fn custom_runtime_options_are_used() {
    let session = BuildSession::new(TrackingOptions {
        emit_manifests: false,
        runtime_url: "/static/track.js".into(),
        runtime_global: "analytics".into(),
        ..Default::default()
    });
    let result = session.transform_source("export const A = () => <div data-track-click=\"a\" />;", "a.tsx");
    assert!(result.code.contains("import \"/static/track.js\";"));
    assert!(result.code.contains("window.analytics.click(\"a\")"));
}

#[test]
fn parse_errors_fail_open() {
    let dir = tempfile::tempdir().unwrap();
    let src = "export const = <div data-track-show=\"x\"";
    let result = session(dir.path()).transform_source(src, "src/Broken.tsx");
    assert_eq!(result.code, src);
    assert!(!result.instrumented);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::TransformFailed);
    assert_eq!(result.diagnostics[0].severity, Severity::Error);
    assert!(!dir.path().join("Broken-tracking.json").exists());
}

#[test]
fn removing_all_markers_retracts_the_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let session = session(dir.path());
    session.transform_source("export const A = () => <div data-track-show=\"a\" />;", "src/A.tsx");
    assert!(dir.path().join("A-tracking.json").exists());

    session.transform_source("export const A = () => <div />;", "src/A.tsx");
    assert!(!dir.path().join("A-tracking.json").exists());
    let summary = session.emitter().read_summary().unwrap();
    assert!(summary.files.is_empty());
    assert_eq!(summary.total_tracking, 0);
}

#[test]
fn same_stem_files_keep_their_own_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let session = session(dir.path());
    session.transform_source("export const A = () => <div data-track-show=\"a\" />;", "src/a/index.tsx");
    session.transform_source("export const B = () => <div />;", "src/b/index.tsx");

    let raw = fs::read_to_string(dir.path().join("index-tracking.json")).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(manifest["file"], "src/a/index.tsx");
    let summary = session.emitter().read_summary().unwrap();
    assert_eq!(summary.total_tracking, 1);
}

#[test]
fn transformed_sources_are_written_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let session = BuildSession::new(TrackingOptions {
        tracking_dir: dir.path().to_path_buf(),
        output_transformed_files: true,
        ..Default::default()
    });
    let result = session.transform_source(AD_PAGE, "src/Page.tsx");
    let written = fs::read_to_string(dir.path().join("transformed").join("Page.tsx")).unwrap();
    assert_eq!(written, result.code);
}

#[test]
fn manifest_write_failures_are_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "").unwrap();
    let result = session(&blocker.join("out")).transform_source(AD_PAGE, "src/Page.tsx");
    assert!(result.instrumented);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::ManifestIo);
}
