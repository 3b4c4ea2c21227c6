use anyhow::Result;
use serde_json::Value;
use serde_sarif::sarif::{
    ArtifactLocation, Location, LogicalLocation, Message, MultiformatMessageString,
    PhysicalLocation, Region, ReportingConfiguration, ReportingDescriptor,
    Result as SarifResult, ResultLevel,
};

use crate::engine::AnalysisContext;
use crate::ir::Class;

pub(crate) mod prng_fix;

/// Metadata describing an analysis rule.
#[derive(Clone, Debug)]
pub(crate) struct RuleMetadata {
    pub(crate) id: &'static str,
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
}

/// Rule interface for analysis execution.
pub(crate) trait Rule {
    fn metadata(&self) -> RuleMetadata;
    fn run(&self, context: &AnalysisContext) -> Result<Vec<SarifResult>>;
}

/// Every rule this tool ships, in reporting order.
pub(crate) fn registry() -> Vec<Box<dyn Rule>> {
    vec![Box::new(prng_fix::PrngFixRule)]
}

/// SARIF reporting descriptors for the tool driver, mirroring the registry.
pub(crate) fn reporting_descriptors() -> Vec<ReportingDescriptor> {
    registry()
        .iter()
        .map(|rule| {
            let metadata = rule.metadata();
            ReportingDescriptor::builder()
                .id(metadata.id)
                .name(metadata.name)
                .short_description(
                    MultiformatMessageString::builder()
                        .text(metadata.description)
                        .build(),
                )
                .default_configuration(
                    ReportingConfiguration::builder().level(warning_level()).build(),
                )
                .build()
        })
        .collect()
}

pub(crate) fn warning_level() -> Value {
    serde_json::to_value(ResultLevel::Warning).expect("serialize result level")
}

/// Location pointing at a manifest element's start tag.
pub(crate) fn element_location(context: &AnalysisContext, line: u32, column: u32) -> Location {
    let artifact = ArtifactLocation::builder()
        .uri(context.manifest_uri.clone())
        .index(context.manifest_artifact_index)
        .build();
    let region = Region::builder()
        .start_line(line as i64)
        .start_column(column as i64)
        .build();
    let physical = PhysicalLocation::builder()
        .artifact_location(artifact)
        .region(region)
        .build();
    Location::builder().physical_location(physical).build()
}

/// Location pointing at a compiled class.
pub(crate) fn class_location(context: &AnalysisContext, class: &Class) -> Location {
    let logical = LogicalLocation::builder()
        .name(class.name.clone())
        .kind("type")
        .build();
    locatable(context, class, vec![logical])
}

/// Location pointing at one method within a compiled class.
pub(crate) fn method_location(
    context: &AnalysisContext,
    class: &Class,
    method_name: &str,
    descriptor: &str,
) -> Location {
    let logical = LogicalLocation::builder()
        .name(format!("{}.{method_name}{descriptor}", class.name))
        .kind("function")
        .build();
    locatable(context, class, vec![logical])
}

fn locatable(
    context: &AnalysisContext,
    class: &Class,
    logical_locations: Vec<LogicalLocation>,
) -> Location {
    match class_artifact_uri(context, class.artifact_index) {
        Some(uri) => {
            let artifact = ArtifactLocation::builder()
                .uri(uri)
                .index(class.artifact_index)
                .build();
            let physical = PhysicalLocation::builder().artifact_location(artifact).build();
            Location::builder()
                .physical_location(physical)
                .logical_locations(logical_locations)
                .build()
        }
        None => Location::builder()
            .logical_locations(logical_locations)
            .build(),
    }
}

fn class_artifact_uri(context: &AnalysisContext, artifact_index: i64) -> Option<String> {
    context
        .artifacts
        .get(usize::try_from(artifact_index).ok()?)
        .and_then(|artifact| artifact.location.as_ref())
        .and_then(|location| location.uri.clone())
}

pub(crate) fn result_message(text: impl Into<String>) -> Message {
    Message::builder().text(text.into()).build()
}

/// Assemble one finding with the rule's id and warning level.
pub(crate) fn finding(rule_id: &str, location: Location, text: String) -> SarifResult {
    SarifResult::builder()
        .rule_id(rule_id)
        .level(ResultLevel::Warning)
        .message(result_message(text))
        .locations(vec![location])
        .build()
}
