mod engine;
mod ir;
mod manifest;
mod matcher;
mod opcodes;
mod project;
mod rules;
mod scan;
#[cfg(test)]
mod testdata;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use serde_sarif::sarif::{
    Artifact, Invocation, Result as SarifResult, Run, SCHEMA_URL, Sarif, Tool, ToolComponent,
};

/// CLI arguments for prnglint execution.
#[derive(Parser, Debug)]
#[command(
    name = "prnglint",
    about = "Checks that an Android application applies the PRNG initialization fix at startup.",
    version
)]
struct Cli {
    /// Project directory; its layout determines the manifest and class roots.
    #[arg(long, value_name = "DIR")]
    project: Option<PathBuf>,
    /// Manifest path, overriding project discovery.
    #[arg(long, value_name = "PATH")]
    manifest: Option<PathBuf>,
    /// Class root (directory, JAR, or class file), overriding project discovery.
    #[arg(long, value_name = "PATH")]
    classes: Vec<PathBuf>,
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Treat the project as a library project, which is exempt from the check.
    #[arg(long)]
    library: bool,
    /// Exit with a nonzero status when findings are reported.
    #[arg(long)]
    fail_on_findings: bool,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    timing: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let fail_on_findings = cli.fail_on_findings;
    let finding_count = run(cli)?;
    if fail_on_findings && finding_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<usize> {
    let started_at = Instant::now();

    let layout = project::resolve(
        cli.project.as_deref(),
        cli.manifest.clone(),
        &cli.classes,
        cli.library,
    )?;

    let manifest_text = fs::read_to_string(&layout.manifest)
        .with_context(|| format!("failed to read {}", layout.manifest.display()))?;
    let elements = manifest::elements(&manifest_text)
        .with_context(|| format!("failed to parse {}", layout.manifest.display()))?;

    let mut artifacts = Vec::new();
    let manifest_artifact_index =
        scan::manifest_artifact(&layout.manifest, manifest_text.len() as u64, &mut artifacts);
    let classes = scan::scan_class_roots(&layout.class_roots, &mut artifacts)?;
    let class_count = classes.len();

    let context = engine::build_context(
        layout.library,
        elements,
        scan::path_to_uri(&layout.manifest),
        manifest_artifact_index,
        classes,
        artifacts,
    );
    let results = engine::analyze(&context)?;
    let finding_count = results.len();

    let invocation = build_invocation();
    let sarif = build_sarif(context.artifacts, invocation, results);

    let mut writer = output_writer(cli.output.as_deref())?;
    serde_json::to_writer_pretty(&mut writer, &sarif)
        .context("failed to serialize SARIF output")?;
    writer
        .write_all(b"\n")
        .context("failed to write SARIF output")?;

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} classes={} findings={}",
            started_at.elapsed().as_millis(),
            class_count,
            finding_count
        );
    }

    Ok(finding_count)
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}

fn build_invocation() -> Invocation {
    let arguments: Vec<String> = std::env::args().collect();
    let command_line = arguments.join(" ");

    Invocation::builder()
        .execution_successful(true)
        .arguments(arguments)
        .command_line(command_line)
        .build()
}

fn build_sarif(
    artifacts: Vec<Artifact>,
    invocation: Invocation,
    results: Vec<SarifResult>,
) -> Sarif {
    let driver = ToolComponent::builder()
        .name("prnglint")
        .information_uri("https://github.com/zakky-dev/prnglint")
        .rules(rules::reporting_descriptors())
        .build();
    let tool = Tool {
        driver,
        extensions: None,
        properties: None,
    };
    let run = if artifacts.is_empty() {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .build()
    } else {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .artifacts(artifacts)
            .build()
    };

    Sarif::builder()
        .schema(SCHEMA_URL)
        .runs(vec![run])
        .version(json!("2.1.0"))
        .build()
}
