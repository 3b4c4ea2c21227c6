use anyhow::Result;
use serde_sarif::sarif::Result as SarifResult;

use crate::engine::{AnalysisContext, AnalysisPhase};
use crate::ir::Class;
use crate::manifest::{ANDROID_NS, ANDROID_PREFIX, ManifestElement};
use crate::matcher::{find_method, find_method_call};
use crate::rules::{
    Rule, RuleMetadata, class_location, element_location, finding, method_location,
};

const APPLICATION_TAG: &str = "application";
const NAME_ATTRIBUTE: &str = "name";

const LIFECYCLE_METHOD_NAME: &str = "onCreate";
const LIFECYCLE_METHOD_DESC: &str = "()V";

const REMEDIATION_OWNER: &str = "org/zakky/prngfix/PRNGFixes";
const REMEDIATION_NAME: &str = "apply";
const REMEDIATION_DESC: &str = "()V";

/// Application entry point captured from the manifest.
///
/// Produced once by the manifest phase and read-only afterwards; each run
/// builds its own value, so nothing leaks between runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ApplicationDeclaration {
    pub(crate) dotted_name: String,
    pub(crate) internal_name: String,
}

impl ApplicationDeclaration {
    fn new(dotted_name: &str) -> Self {
        Self {
            dotted_name: dotted_name.to_string(),
            internal_name: dotted_name.replace('.', "/"),
        }
    }
}

/// Outcome of visiting one manifest element.
#[derive(Debug, Eq, PartialEq)]
enum ElementVisit {
    Ignored,
    MissingName,
    Declared(ApplicationDeclaration),
}

/// Outcome of checking one compiled class.
#[derive(Debug, Eq, PartialEq)]
enum ClassCheck {
    Skipped,
    MissingOverride,
    MissingRemediationCall,
    Verified,
}

/// Verifies that the declared application class applies the PRNG
/// initialization fix in its `onCreate()` callback.
pub(crate) struct PrngFixRule;

impl Rule for PrngFixRule {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "PrngFix",
            name: "PRNG initialization fix applied",
            description: "Checks that the application class applies the PRNG initialization fix \
                          on startup",
        }
    }

    fn run(&self, context: &AnalysisContext) -> Result<Vec<SarifResult>> {
        let rule_id = self.metadata().id;
        let mut results = Vec::new();

        // Manifest phase. A later application element overwrites an earlier
        // declaration; a missing name is reported without clearing one.
        let mut declaration = None;
        for element in &context.manifest_elements {
            match visit_element(AnalysisPhase::Manifest, context.library, element) {
                ElementVisit::Ignored => {}
                ElementVisit::MissingName => {
                    results.push(finding(
                        rule_id,
                        element_location(context, element.line, element.column),
                        format!(
                            "Specify an application class in the \
                             {ANDROID_PREFIX}{NAME_ATTRIBUTE} attribute"
                        ),
                    ));
                }
                ElementVisit::Declared(value) => declaration = Some(value),
            }
        }

        // Class phase. Without a declaration there is nothing to verify; the
        // missing-name finding above already covers that run.
        let Some(declaration) = declaration else {
            return Ok(results);
        };
        for class in &context.classes {
            match check_class(AnalysisPhase::Class, &declaration, class) {
                ClassCheck::Skipped => continue,
                ClassCheck::MissingOverride => {
                    results.push(finding(
                        rule_id,
                        class_location(context, class),
                        format!(
                            "Override {LIFECYCLE_METHOD_NAME}() in {} and call PRNGFixes.apply()",
                            declaration.dotted_name
                        ),
                    ));
                }
                ClassCheck::MissingRemediationCall => {
                    results.push(finding(
                        rule_id,
                        method_location(context, class, LIFECYCLE_METHOD_NAME, LIFECYCLE_METHOD_DESC),
                        format!(
                            "{}.{LIFECYCLE_METHOD_NAME}() does not call PRNGFixes.apply()",
                            declaration.dotted_name
                        ),
                    ));
                }
                ClassCheck::Verified => {}
            }
            // The matched class is verified exactly once per run.
            break;
        }

        Ok(results)
    }
}

/// Manifest extractor: captures the application class name, if any.
fn visit_element(phase: AnalysisPhase, library: bool, element: &ManifestElement) -> ElementVisit {
    if phase != AnalysisPhase::Manifest {
        return ElementVisit::Ignored;
    }
    if library {
        // Library projects do not need the fix.
        return ElementVisit::Ignored;
    }
    if element.namespace.is_some() || element.tag != APPLICATION_TAG {
        return ElementVisit::Ignored;
    }
    match element.attribute(Some(ANDROID_NS), NAME_ATTRIBUTE) {
        None | Some("") => ElementVisit::MissingName,
        Some(name) => ElementVisit::Declared(ApplicationDeclaration::new(name)),
    }
}

/// Class verifier: checks the lifecycle override and the remediation call.
fn check_class(
    phase: AnalysisPhase,
    declaration: &ApplicationDeclaration,
    class: &Class,
) -> ClassCheck {
    if phase != AnalysisPhase::Class {
        return ClassCheck::Skipped;
    }
    if declaration.internal_name.is_empty() {
        return ClassCheck::Skipped;
    }
    if class.name != declaration.internal_name {
        return ClassCheck::Skipped;
    }

    let Some(method) = find_method(&class.methods, LIFECYCLE_METHOD_NAME, LIFECYCLE_METHOD_DESC)
    else {
        return ClassCheck::MissingOverride;
    };
    if find_method_call(
        &method.instructions,
        REMEDIATION_OWNER,
        REMEDIATION_NAME,
        REMEDIATION_DESC,
    )
    .is_none()
    {
        return ClassCheck::MissingRemediationCall;
    }
    ClassCheck::Verified
}
