use anyhow::Result;
use std::path::Path;

use crate::{
    archive::ArchiveExtractor,
    descriptor::Descriptor,
    lifecycle::BuildError,
    package::{DependencyProvider, Resolution, Unsatisfied, resolve_all},
    runtime::Runtime,
};

use super::config::Config;

/// Resolve the dependencies of a descriptor without building it.
#[tracing::instrument(skip(config))]
pub fn check<R: Runtime, E: ArchiveExtractor>(config: &Config<R, E>, spec_path: &Path) -> Result<()> {
    let descriptor = config.load_descriptor(spec_path)?;
    let provider = config.provider();
    let report = check_descriptor(&descriptor, provider.as_ref())?;
    print!("{}", report.text);

    match report.unsatisfied.into_iter().next() {
        Some(first) => Err(BuildError::from(first).into()),
        None => Ok(()),
    }
}

pub(crate) struct CheckReport {
    pub text: String,
    pub unsatisfied: Vec<Unsatisfied>,
}

pub(crate) fn check_descriptor<P: DependencyProvider + ?Sized>(
    descriptor: &Descriptor,
    provider: &P,
) -> Result<CheckReport> {
    let mut report = CheckReport {
        text: String::new(),
        unsatisfied: Vec::new(),
    };

    let sets = [&descriptor.build_requires, &descriptor.requires];
    let Some(resolutions) = resolve_all(provider, &sets)? else {
        report.text = format!(
            "{}: dependencies not checked\n",
            descriptor.metadata.nvr()
        );
        return Ok(report);
    };

    let labels = descriptor
        .build_requires
        .iter()
        .map(|_| "BuildRequires")
        .chain(descriptor.requires.iter().map(|_| "Requires"));
    for (label, resolution) in labels.zip(resolutions) {
        match resolution {
            Resolution::Satisfied {
                constraint,
                version,
            } => report
                .text
                .push_str(&format!("{}: {} ... {}\n", label, constraint, version)),
            Resolution::Unsatisfied(missing) => {
                report.text.push_str(&format!(
                    "{}: {} ... MISSING ({})\n",
                    label, missing.constraint, missing
                ));
                report.unsatisfied.push(missing);
            }
        }
    }

    if report.unsatisfied.is_empty() {
        report.text.push_str(&format!(
            "{}: all dependencies satisfied\n",
            descriptor.metadata.nvr()
        ));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Inventory, Permissive, check_all};

    fn descriptor() -> Descriptor {
        "Name: nodeconductor-plus\nVersion: 0.2.0\nRelease: 1.el7\n\
         Requires: nodeconductor > 0.109.0\n\
         Requires: nodeconductor_paypal > 0.3.5\n\
         BuildRequires: python-setuptools\n"
            .parse()
            .unwrap()
    }

    fn inventory(entries: &[(&str, &str)]) -> Inventory {
        let mut inventory = Inventory::default();
        for (name, version) in entries {
            inventory.insert(*name, version.parse().unwrap());
        }
        inventory
    }

    #[test]
    fn test_all_satisfied() {
        let provider = inventory(&[
            ("nodeconductor", "0.109.0"),
            ("nodeconductor", "0.110.0"),
            ("nodeconductor_paypal", "0.3.6"),
            ("python-setuptools", "0.9.8"),
        ]);

        let report = check_descriptor(&descriptor(), &provider).unwrap();

        assert!(report.unsatisfied.is_empty());
        assert_eq!(
            report.text,
            "BuildRequires: python-setuptools ... 0.9.8\n\
             Requires: nodeconductor > 0.109.0 ... 0.110.0\n\
             Requires: nodeconductor_paypal > 0.3.5 ... 0.3.6\n\
             nodeconductor-plus-0.2.0-1.el7: all dependencies satisfied\n"
        );
    }

    #[test]
    fn test_reports_every_unsatisfied_constraint() {
        let provider = inventory(&[("nodeconductor", "0.109.0"), ("python-setuptools", "0.9.8")]);

        let report = check_descriptor(&descriptor(), &provider).unwrap();

        let names: Vec<_> = report
            .unsatisfied
            .iter()
            .map(|u| u.constraint.name.as_str())
            .collect();
        assert_eq!(names, vec!["nodeconductor", "nodeconductor_paypal"]);
        let d = descriptor();
        assert_eq!(
            report.unsatisfied,
            check_all(&provider, &[&d.build_requires, &d.requires]).unwrap()
        );
        assert!(report.text.contains(
            "nodeconductor > 0.109.0 ... MISSING (nodeconductor > 0.109.0 is needed but only 0.109.0 available)"
        ));
    }

    #[test]
    fn test_permissive_skips() {
        let report = check_descriptor(&descriptor(), &Permissive).unwrap();
        assert!(report.unsatisfied.is_empty());
        assert_eq!(report.text, "nodeconductor-plus-0.2.0-1.el7: dependencies not checked\n");
    }
}
