//! Line-oriented parser for package build descriptors.

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, warn};

use super::changelog::Changelog;
use super::macros::MacroTable;
use super::model::{
    Descriptor, FileEntry, FileKind, FilesSpec, NOARCH, PackageMetadata, Scripts, SetupDirective,
};
use crate::package::{DependencySet, parse_dependency_list};

#[derive(Debug, Clone, PartialEq)]
enum Section {
    Preamble,
    Description,
    Prep,
    Build,
    Install,
    Clean,
    Files,
    Changelog,
    /// Recognised but not supported here (`%check`, `%post`, subpackages, ...).
    Ignored(String),
}

/// Sections whose bodies are skipped.
const IGNORED_SECTIONS: &[&str] = &[
    "check",
    "package",
    "pre",
    "post",
    "preun",
    "postun",
    "pretrans",
    "posttrans",
    "verifyscript",
    "triggerin",
    "triggerun",
    "triggerpostun",
];

/// Tags accepted in the preamble without effect.
const IGNORED_TAGS: &[&str] = &[
    "group",
    "vendor",
    "packager",
    "prefix",
    "buildroot",
    "provides",
    "obsoletes",
    "conflicts",
    "epoch",
    "autoreq",
    "autoprov",
    "autoreqprov",
    "distribution",
];

#[derive(Default)]
struct Preamble {
    name: Option<String>,
    summary: Option<String>,
    version: Option<String>,
    release: Option<String>,
    license: Option<String>,
    url: Option<String>,
    source0: Option<String>,
    build_arch: Option<String>,
    requires: DependencySet,
    build_requires: DependencySet,
}

/// Parse descriptor text.
///
/// `macros` is the initial macro table (layout macros such as `_topdir`,
/// user `--define`s). Tags and `%define`/`%global` lines add to it.
pub fn parse_descriptor(text: &str, mut macros: MacroTable) -> Result<Descriptor> {
    let mut preamble = Preamble::default();
    let mut section = Section::Preamble;
    let mut files_spec: Option<FilesSpec> = None;
    let mut bodies: Vec<(Section, String)> = Vec::new();
    let mut current = String::new();

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;

        if let Some(next) = section_header(line, &mut files_spec, &macros)
            .with_context(|| format!("Line {}", line_no))?
        {
            debug!("Line {}: entering section {:?}", line_no, next);
            bodies.push((section, std::mem::take(&mut current)));
            section = next;
            continue;
        }

        if section == Section::Preamble {
            parse_preamble_line(line, &mut preamble, &mut macros)
                .with_context(|| format!("Line {}", line_no))?;
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    bodies.push((section, current));

    let build_arch = preamble.build_arch.unwrap_or_else(|| NOARCH.to_string());
    if !macros.is_defined("_build_arch") {
        macros.define("_build_arch", build_arch.clone());
    }

    let metadata = PackageMetadata {
        name: required_tag(preamble.name, "Name")?,
        summary: preamble.summary,
        version: required_tag(preamble.version, "Version")?,
        release: required_tag(preamble.release, "Release")?,
        license: preamble.license,
        url: preamble.url,
        source0: preamble.source0,
        build_arch,
    };

    let mut description = String::new();
    let mut setup = SetupDirective::default();
    let mut scripts = Scripts::default();
    let mut changelog = Changelog::new();
    let mut files_body = String::new();

    for (section, body) in bodies {
        match section {
            Section::Preamble => {}
            Section::Description => description.push_str(body.trim()),
            Section::Prep => {
                let (directive, script) = split_prep(&body, &macros)?;
                setup = directive;
                scripts.prep = macros.expand(&script);
            }
            Section::Build => scripts.build = macros.expand(&body),
            Section::Install => scripts.install = macros.expand(&body),
            Section::Clean => scripts.clean = macros.expand(&body),
            Section::Files => files_body.push_str(&macros.expand(&body)),
            Section::Changelog => {
                changelog = Changelog::parse(&body).context("Invalid %changelog section")?
            }
            Section::Ignored(name) => {
                if !body.trim().is_empty() {
                    warn!("Ignoring unsupported section %{}", name);
                }
            }
        }
    }

    if let Some(spec) = files_spec.as_mut() {
        spec.entries = parse_file_entries(&files_body)?;
    }

    Ok(Descriptor {
        metadata,
        requires: preamble.requires,
        build_requires: preamble.build_requires,
        description,
        setup,
        scripts,
        files: files_spec,
        changelog,
        macros,
    })
}

fn required_tag(value: Option<String>, tag: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("Missing required tag: {}", tag))
}

/// Detect a section header line and return the section it starts.
fn section_header(
    line: &str,
    files_spec: &mut Option<FilesSpec>,
    macros: &MacroTable,
) -> Result<Option<Section>> {
    let trimmed = line.trim();
    let Some(directive) = trimmed.strip_prefix('%') else {
        return Ok(None);
    };
    let mut words = directive.split_whitespace();
    let keyword = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let section = match keyword {
        "description" if args.is_empty() => Section::Description,
        "prep" => Section::Prep,
        "build" => Section::Build,
        "install" => Section::Install,
        "clean" => Section::Clean,
        "changelog" => Section::Changelog,
        "files" => match parse_files_args(&args, macros)? {
            Some(lists) => {
                if files_spec.is_some() {
                    bail!("Duplicate %files section");
                }
                *files_spec = Some(FilesSpec {
                    file_lists: lists,
                    entries: Vec::new(),
                });
                Section::Files
            }
            None => Section::Ignored(format!("files {}", args.join(" "))),
        },
        "description" => Section::Ignored(format!("description {}", args.join(" "))),
        k if IGNORED_SECTIONS.contains(&k) => Section::Ignored(k.to_string()),
        _ => return Ok(None),
    };
    Ok(Some(section))
}

/// Arguments of `%files`. Returns `None` for a subpackage's `%files`.
fn parse_files_args(args: &[&str], macros: &MacroTable) -> Result<Option<Vec<String>>> {
    let mut lists = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match *arg {
            "-f" => {
                let file = iter
                    .next()
                    .ok_or_else(|| anyhow!("%files -f requires a file name"))?;
                lists.push(macros.expand(file));
            }
            other if other.starts_with('-') => {
                debug!("Ignoring %files option {}", other);
            }
            _ => return Ok(None),
        }
    }
    Ok(Some(lists))
}

fn parse_preamble_line(line: &str, preamble: &mut Preamble, macros: &mut MacroTable) -> Result<()> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(());
    }

    for keyword in ["%define", "%global"] {
        if let Some(body) = trimmed.strip_prefix(keyword) {
            if !macros.define_from_line(body) {
                bail!("Invalid macro definition: {}", trimmed);
            }
            return Ok(());
        }
    }

    let (tag, value) = trimmed
        .split_once(':')
        .ok_or_else(|| anyhow!("Unrecognized preamble line: {}", trimmed))?;
    // Qualifiers such as Requires(post) do not change the tag.
    let tag = tag.split('(').next().unwrap_or(tag).trim().to_ascii_lowercase();
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        bail!("Unrecognized preamble line: {}", trimmed);
    }
    let value = macros.expand(value.trim());

    match tag.as_str() {
        "name" => {
            check_identity_value(&value, "Name", false)?;
            macros.define("name", value.clone());
            preamble.name = Some(value);
        }
        "version" => {
            check_identity_value(&value, "Version", true)?;
            macros.define("version", value.clone());
            preamble.version = Some(value);
        }
        "release" => {
            check_identity_value(&value, "Release", true)?;
            macros.define("release", value.clone());
            preamble.release = Some(value);
        }
        "summary" => preamble.summary = Some(value),
        "license" => preamble.license = Some(value),
        "url" => preamble.url = Some(value),
        "source" | "source0" => preamble.source0 = Some(value),
        "buildarch" | "buildarchitectures" => {
            macros.define("_build_arch", value.clone());
            preamble.build_arch = Some(value);
        }
        "requires" => {
            for constraint in parse_dependency_list(&value)? {
                preamble.requires.insert(constraint)?;
            }
        }
        "buildrequires" => {
            for constraint in parse_dependency_list(&value)? {
                preamble.build_requires.insert(constraint)?;
            }
        }
        t if t.starts_with("source") || t.starts_with("patch") => {
            warn!("Only Source0 is supported, ignoring {}: {}", tag, value);
        }
        t if IGNORED_TAGS.contains(&t) => debug!("Ignoring tag {}: {}", tag, value),
        _ => warn!("Unknown tag {}: {}", tag, value),
    }
    Ok(())
}

fn check_identity_value(value: &str, tag: &str, forbid_dash: bool) -> Result<()> {
    if value.is_empty() {
        bail!("Empty value for tag {}", tag);
    }
    if value.chars().any(char::is_whitespace) {
        bail!("Illegal whitespace in {}: '{}'", tag, value);
    }
    if forbid_dash && value.contains('-') {
        bail!("Illegal char '-' in {}: '{}'", tag, value);
    }
    Ok(())
}

/// Split `%prep` into its `%setup` directive and the remaining script.
fn split_prep(body: &str, macros: &MacroTable) -> Result<(SetupDirective, String)> {
    let mut directive = SetupDirective::default();
    let mut script = String::new();

    for line in body.lines() {
        let trimmed = line.trim();
        let args = trimmed
            .strip_prefix("%setup")
            .or_else(|| trimmed.strip_prefix("%autosetup"));
        let Some(args) = args else {
            script.push_str(line);
            script.push('\n');
            continue;
        };

        let mut words = args.split_whitespace();
        while let Some(word) = words.next() {
            match word {
                "-q" => directive.quiet = true,
                "-n" => {
                    let dir = words
                        .next()
                        .ok_or_else(|| anyhow!("%setup -n requires a directory name"))?;
                    directive.dir_name = Some(macros.expand(dir));
                }
                other => debug!("Ignoring %setup option {}", other),
            }
        }
    }

    Ok((directive, script))
}

/// Parse the (already expanded) body of `%files`.
pub fn parse_file_entries(body: &str) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();

    for line in body.lines() {
        let mut rest = line.trim();
        if rest.is_empty() || rest.starts_with('#') || rest.starts_with("%defattr") {
            continue;
        }

        let mut kind = FileKind::Regular;
        while let Some(directive) = rest.strip_prefix('%') {
            let end = directive
                .find(|c: char| !c.is_ascii_alphanumeric())
                .unwrap_or(directive.len());
            let (word, after) = directive.split_at(end);
            let after = if after.starts_with('(') {
                let close = after
                    .find(')')
                    .ok_or_else(|| anyhow!("Unterminated %{}(...) in %files", word))?;
                &after[close + 1..]
            } else {
                after
            };
            kind = match word {
                "doc" => FileKind::Doc,
                "license" => FileKind::License,
                "config" => FileKind::Config,
                "dir" => FileKind::Dir,
                "ghost" => FileKind::Ghost,
                "attr" | "verify" | "lang" | "caps" => kind,
                other => bail!("Unsupported %files directive %{}", other),
            };
            rest = after.trim_start();
        }

        for path in rest.split_whitespace() {
            entries.push(FileEntry {
                path: path.to_string(),
                kind,
            });
        }
    }

    Ok(entries)
}
