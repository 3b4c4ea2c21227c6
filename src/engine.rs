use anyhow::Result;
use serde_sarif::sarif::{Artifact, Result as SarifResult};

use crate::ir::Class;
use crate::manifest::ManifestElement;
use crate::rules;

/// Analysis pass currently being driven.
///
/// Passed explicitly into every per-element and per-class callback; rules
/// must no-op when invoked under the wrong phase.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum AnalysisPhase {
    /// The pass over the package manifest.
    Manifest,
    /// The pass over compiled classes.
    Class,
}

/// Read-only inputs for one analysis run.
pub(crate) struct AnalysisContext {
    /// Library projects are exempt from the manifest check.
    pub(crate) library: bool,
    /// Manifest elements in document order.
    pub(crate) manifest_elements: Vec<ManifestElement>,
    pub(crate) manifest_uri: String,
    pub(crate) manifest_artifact_index: i64,
    /// Lowered classes in deterministic scan order.
    pub(crate) classes: Vec<Class>,
    /// SARIF artifact table built while loading the inputs.
    pub(crate) artifacts: Vec<Artifact>,
}

pub(crate) fn build_context(
    library: bool,
    manifest_elements: Vec<ManifestElement>,
    manifest_uri: String,
    manifest_artifact_index: i64,
    classes: Vec<Class>,
    artifacts: Vec<Artifact>,
) -> AnalysisContext {
    AnalysisContext {
        library,
        manifest_elements,
        manifest_uri,
        manifest_artifact_index,
        classes,
        artifacts,
    }
}

/// Run every registered rule over the context, in registry order.
pub(crate) fn analyze(context: &AnalysisContext) -> Result<Vec<SarifResult>> {
    let mut results = Vec::new();
    for rule in rules::registry() {
        results.extend(rule.run(context)?);
    }
    Ok(results)
}
