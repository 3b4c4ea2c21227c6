use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Inputs resolved for one analysis run.
#[derive(Clone, Debug)]
pub(crate) struct ProjectLayout {
    pub(crate) manifest: PathBuf,
    pub(crate) class_roots: Vec<PathBuf>,
    pub(crate) library: bool,
}

/// A known project layout convention, probed in order, newest first.
struct LayoutProbe {
    name: &'static str,
    manifest: &'static str,
    class_roots: &'static [&'static str],
}

const LAYOUTS: &[LayoutProbe] = &[
    LayoutProbe {
        name: "gradle",
        manifest: "src/main/AndroidManifest.xml",
        class_roots: &["build/intermediates/classes", "build/classes"],
    },
    LayoutProbe {
        name: "adt",
        manifest: "AndroidManifest.xml",
        class_roots: &["bin/classes"],
    },
];

/// Resolve the manifest, class roots, and library flag for one run.
///
/// Explicit `--manifest`/`--classes` paths win; `--project` discovery fills
/// in whatever was not given. An unrecognized project layout is a fatal
/// configuration error, never a finding.
pub(crate) fn resolve(
    project: Option<&Path>,
    manifest: Option<PathBuf>,
    classes: &[PathBuf],
    library_flag: bool,
) -> Result<ProjectLayout> {
    if let Some(path) = &manifest {
        if !path.exists() {
            anyhow::bail!("manifest not found: {}", path.display());
        }
    }
    for path in classes {
        if !path.exists() {
            anyhow::bail!("class root not found: {}", path.display());
        }
    }

    let manifest = match (manifest, project) {
        (Some(path), _) => path,
        (None, Some(dir)) => probe_layout(dir)?.0,
        (None, None) => anyhow::bail!("no manifest to analyze; pass --manifest or --project"),
    };

    let class_roots = if classes.is_empty() {
        match project {
            Some(dir) => probe_layout(dir)?.1,
            None => anyhow::bail!("no class roots to analyze; pass --classes or --project"),
        }
    } else {
        classes.to_vec()
    };

    let library = library_flag
        || match project {
            Some(dir) => is_library_project(dir)?,
            None => false,
        };

    Ok(ProjectLayout {
        manifest,
        class_roots,
        library,
    })
}

/// Try each known layout and return its manifest and existing class roots.
fn probe_layout(project: &Path) -> Result<(PathBuf, Vec<PathBuf>)> {
    for layout in LAYOUTS {
        let manifest = project.join(layout.manifest);
        if !manifest.exists() {
            continue;
        }
        let class_roots: Vec<PathBuf> = layout
            .class_roots
            .iter()
            .map(|root| project.join(root))
            .filter(|root| root.exists())
            .collect();
        if class_roots.is_empty() {
            anyhow::bail!(
                "no class roots found for {} layout under {}",
                layout.name,
                project.display()
            );
        }
        return Ok((manifest, class_roots));
    }
    anyhow::bail!(
        "unrecognized project layout under {}: no gradle or adt manifest found",
        project.display()
    )
}

/// ADT projects mark library projects in `project.properties`.
fn is_library_project(project: &Path) -> Result<bool> {
    let path = project.join("project.properties");
    if !path.exists() {
        return Ok(false);
    }
    let text =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .any(|(key, value)| key.trim() == "android.library" && value.trim() == "true"))
}
