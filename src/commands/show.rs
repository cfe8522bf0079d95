use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::{
    archive::{
        ArchiveExtractor, ArtifactEntry, ArtifactMetadata, list_artifact, read_artifact_metadata,
    },
    descriptor::{Changelog, Descriptor},
    lifecycle::Workspace,
    package::DependencySet,
    runtime::Runtime,
};

use super::config::Config;

/// Show a descriptor summary, or the metadata and files of an artifact.
#[tracing::instrument(skip(config))]
pub fn show<R: Runtime, E: ArchiveExtractor>(
    config: &Config<R, E>,
    path: &Path,
    json: bool,
) -> Result<()> {
    let output = if is_artifact(path) {
        debug!("Reading artifact {:?}", path);
        let view = ArtifactView {
            metadata: read_artifact_metadata(&config.runtime, path)?,
            files: list_artifact(&config.runtime, path)?,
        };
        if json {
            to_json(&view)?
        } else {
            render_artifact(&view)
        }
    } else {
        let descriptor = config.load_descriptor(path)?;
        let summary = DescriptorSummary::new(&descriptor, &config.workspace);
        if json {
            to_json(&summary)?
        } else {
            render_descriptor(&summary)
        }
    };
    print!("{}", output);
    Ok(())
}

fn is_artifact(path: &Path) -> bool {
    let name = path.to_string_lossy().to_lowercase();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    json.push('\n');
    Ok(json)
}

#[derive(Debug, Serialize)]
struct ArtifactView {
    metadata: ArtifactMetadata,
    files: Vec<ArtifactEntry>,
}

#[derive(Debug, Serialize)]
struct DescriptorSummary<'a> {
    name: &'a str,
    version: &'a str,
    release: &'a str,
    arch: &'a str,
    summary: Option<&'a str>,
    license: Option<&'a str>,
    url: Option<&'a str>,
    source0: Option<&'a str>,
    requires: &'a DependencySet,
    build_requires: &'a DependencySet,
    description: &'a str,
    changelog: &'a Changelog,
    artifact: PathBuf,
}

impl<'a> DescriptorSummary<'a> {
    fn new(descriptor: &'a Descriptor, workspace: &Workspace) -> Self {
        let meta = &descriptor.metadata;
        Self {
            name: &meta.name,
            version: &meta.version,
            release: &meta.release,
            arch: &meta.build_arch,
            summary: meta.summary.as_deref(),
            license: meta.license.as_deref(),
            url: meta.url.as_deref(),
            source0: meta.source0.as_deref(),
            requires: &descriptor.requires,
            build_requires: &descriptor.build_requires,
            description: &descriptor.description,
            changelog: &descriptor.changelog,
            artifact: workspace.artifact_path(meta),
        }
    }
}

fn join_set(set: &DependencySet) -> String {
    if set.is_empty() {
        return "(none)".to_string();
    }
    set.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_descriptor(summary: &DescriptorSummary<'_>) -> String {
    let mut out = String::new();
    let rows = [
        ("Name", Some(summary.name)),
        ("Version", Some(summary.version)),
        ("Release", Some(summary.release)),
        ("Architecture", Some(summary.arch)),
        ("Summary", summary.summary),
        ("License", summary.license),
        ("URL", summary.url),
        ("Source0", summary.source0),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            let _ = writeln!(out, "{:<14}: {}", label, value);
        }
    }
    let _ = writeln!(out, "{:<14}: {}", "Requires", join_set(summary.requires));
    let _ = writeln!(out, "{:<14}: {}", "BuildRequires", join_set(summary.build_requires));
    let _ = writeln!(out, "{:<14}: {}", "Artifact", summary.artifact.display());

    if !summary.description.is_empty() {
        let _ = writeln!(out, "Description   :\n{}", summary.description);
    }
    if let Some(latest) = summary.changelog.latest() {
        let _ = write!(
            out,
            "Last change   : {} {}",
            latest.date.format("%a %b %d %Y"),
            latest.author
        );
        if let Some(version) = &latest.version {
            let _ = write!(out, " - {}", version);
        }
        out.push('\n');
        for item in &latest.items {
            let _ = writeln!(out, "- {}", item);
        }
    }
    out
}

fn render_artifact(view: &ArtifactView) -> String {
    let meta = &view.metadata;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}-{}-{}.{}",
        meta.name, meta.version, meta.release, meta.arch
    );
    if let Some(summary) = &meta.summary {
        let _ = writeln!(out, "{:<14}: {}", "Summary", summary);
    }
    if let Some(license) = &meta.license {
        let _ = writeln!(out, "{:<14}: {}", "License", license);
    }
    let _ = writeln!(out, "{:<14}: {}", "Requires", join_set(&meta.requires));
    let _ = writeln!(out, "Files ({}):", view.files.len());
    for entry in &view.files {
        match (&entry.link, entry.is_dir) {
            (Some(target), _) => {
                let _ = writeln!(out, "  /{} -> {}", entry.path, target);
            }
            (None, true) => {
                let _ = writeln!(out, "  /{}/", entry.path);
            }
            (None, false) => {
                let _ = writeln!(out, "  /{}", entry.path);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = "\
Name: nodeconductor-plus
Summary: NodeConductor Plus
Version: 0.2.0
Release: 1.el7
License: MIT
Requires: nodeconductor > 0.109.0

%description
NodeConductor extensions.

%changelog
* Wed Nov 25 2015 Jenkins <jenkins@opennodecloud.com> - 0.2.0-1.el7
- New upstream release
";

    #[test]
    fn test_render_descriptor() {
        let descriptor: Descriptor = DESCRIPTOR.parse().unwrap();
        let workspace = Workspace::new(PathBuf::from("/top"), None);
        let text = render_descriptor(&DescriptorSummary::new(&descriptor, &workspace));

        assert!(text.contains("Name          : nodeconductor-plus\n"));
        assert!(text.contains("Requires      : nodeconductor > 0.109.0\n"));
        assert!(text.contains("BuildRequires : (none)\n"));
        assert!(text.contains(
            "Artifact      : /top/RPMS/noarch/nodeconductor-plus-0.2.0-1.el7.noarch.tar.gz\n"
        ));
        assert!(text.contains(
            "Last change   : Wed Nov 25 2015 Jenkins <jenkins@opennodecloud.com> - 0.2.0-1.el7\n- New upstream release\n"
        ));
        assert!(!text.contains("URL"));
    }

    #[test]
    fn test_descriptor_summary_json() {
        let descriptor: Descriptor = DESCRIPTOR.parse().unwrap();
        let workspace = Workspace::new(PathBuf::from("/top"), None);
        let json = to_json(&DescriptorSummary::new(&descriptor, &workspace)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["name"], "nodeconductor-plus");
        assert_eq!(value["requires"][0]["name"], "nodeconductor");
        assert_eq!(value["changelog"][0]["date"], "2015-11-25");
    }

    #[test]
    fn test_render_artifact() {
        let view = ArtifactView {
            metadata: ArtifactMetadata {
                name: "demo".into(),
                version: "1.0".into(),
                release: "1".into(),
                arch: "noarch".into(),
                license: None,
                summary: Some("Demo".into()),
                url: None,
                requires: DependencySet::new(),
            },
            files: vec![
                ArtifactEntry {
                    path: "usr/share/demo".into(),
                    size: 0,
                    mode: 0o755,
                    is_dir: true,
                    link: None,
                },
                ArtifactEntry {
                    path: "usr/share/demo/data.txt".into(),
                    size: 5,
                    mode: 0o644,
                    is_dir: false,
                    link: None,
                },
                ArtifactEntry {
                    path: "usr/bin/demo".into(),
                    size: 0,
                    mode: 0o777,
                    is_dir: false,
                    link: Some("../share/demo/run".into()),
                },
            ],
        };

        assert_eq!(
            render_artifact(&view),
            "demo-1.0-1.noarch\n\
             Summary       : Demo\n\
             Requires      : (none)\n\
             Files (3):\n  /usr/share/demo/\n  /usr/share/demo/data.txt\n  \
             /usr/bin/demo -> ../share/demo/run\n"
        );
    }

    #[test]
    fn test_is_artifact() {
        assert!(is_artifact(Path::new("RPMS/noarch/demo-1.0-1.noarch.tar.gz")));
        assert!(!is_artifact(Path::new("demo.spec")));
    }
}
