//! Dependency constraints as declared by `Requires` and `BuildRequires`.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::version::{Op, Version, VersionConstraint};

/// A dependency on a named package, optionally bounded by a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyConstraint {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<VersionConstraint>,
}

impl DependencyConstraint {
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }

    pub fn bounded(name: impl Into<String>, op: Op, version: Version) -> Self {
        Self {
            name: name.into(),
            constraint: Some(VersionConstraint::new(op, version)),
        }
    }

    /// True if `candidate` satisfies this constraint.
    pub fn is_satisfied_by(&self, candidate: &Version) -> bool {
        self.constraint
            .as_ref()
            .is_none_or(|constraint| constraint.matches(candidate))
    }
}

impl std::fmt::Display for DependencyConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.constraint {
            Some(constraint) => write!(f, "{} {}", self.name, constraint),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for DependencyConstraint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut constraints = parse_dependency_list(s)?;
        match constraints.len() {
            1 => Ok(constraints.remove(0)),
            0 => Err(anyhow!("Invalid dependency: empty")),
            _ => Err(anyhow!(
                "Invalid dependency '{}': expected a single dependency",
                s
            )),
        }
    }
}

const OPERATOR_CHARS: &[char] = &['<', '>', '='];

/// Parse the value of a `Requires:` line.
///
/// Accepts comma and/or whitespace separated entries, each a name optionally
/// followed by an operator and a version: `nodeconductor > 0.109.0, six`.
/// Operators glued to the name (`html5lib<0.99999999`) are accepted too.
pub fn parse_dependency_list(value: &str) -> Result<Vec<DependencyConstraint>> {
    let mut tokens: Vec<String> = Vec::new();
    for raw in value.split(|c: char| c == ',' || c.is_whitespace()) {
        if raw.is_empty() {
            continue;
        }
        split_glued_operator(raw, &mut tokens);
    }

    let mut result = Vec::new();
    let mut iter = tokens.into_iter().peekable();
    while let Some(name) = iter.next() {
        if name.starts_with(OPERATOR_CHARS) {
            bail!(
                "Invalid dependency list '{}': operator '{}' without a package name",
                value,
                name
            );
        }

        let is_operator = iter
            .peek()
            .is_some_and(|next| next.starts_with(OPERATOR_CHARS));
        if !is_operator {
            result.push(DependencyConstraint::any(name));
            continue;
        }

        let op: Op = iter.next().unwrap_or_default().parse()?;
        let version = iter
            .next()
            .ok_or_else(|| anyhow!("Invalid dependency '{} {}': missing version", name, op))?;
        let version: Version = version.parse()?;
        result.push(DependencyConstraint::bounded(name, op, version));
    }

    Ok(result)
}

fn split_glued_operator(raw: &str, tokens: &mut Vec<String>) {
    let Some(op_start) = raw.find(OPERATOR_CHARS) else {
        tokens.push(raw.to_string());
        return;
    };
    let op_end = raw[op_start..]
        .find(|c: char| !OPERATOR_CHARS.contains(&c))
        .map(|i| op_start + i)
        .unwrap_or(raw.len());

    for part in [&raw[..op_start], &raw[op_start..op_end], &raw[op_end..]] {
        if !part.is_empty() {
            tokens.push(part.to_string());
        }
    }
}

/// A list of dependency constraints with unique package names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencySet {
    constraints: Vec<DependencyConstraint>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint. Fails if a constraint on the same name exists.
    pub fn insert(&mut self, constraint: DependencyConstraint) -> Result<()> {
        if self.get(&constraint.name).is_some() {
            bail!(
                "Duplicate dependency '{}': each package may only be required once",
                constraint.name
            );
        }
        self.constraints.push(constraint);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DependencyConstraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependencyConstraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a DependencyConstraint;
    type IntoIter = std::slice::Iter<'a, DependencyConstraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.constraints.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_bounded() {
        let deps = parse_dependency_list("nodeconductor > 0.109.0").unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "nodeconductor");
        let constraint = deps[0].constraint.as_ref().unwrap();
        assert_eq!(constraint.op, Op::Greater);
        assert_eq!(constraint.version.version, "0.109.0");
    }

    #[test]
    fn test_parse_mixed_list() {
        let deps =
            parse_dependency_list("python-setuptools, nodeconductor_paypal > 0.3.5 six").unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["python-setuptools", "nodeconductor_paypal", "six"]);
        assert!(deps[0].constraint.is_none());
        assert!(deps[1].constraint.is_some());
        assert!(deps[2].constraint.is_none());
    }

    #[test]
    fn test_parse_glued_operator() {
        let deps = parse_dependency_list("html5lib<0.99999999").unwrap();
        assert_eq!(deps[0].name, "html5lib");
        assert_eq!(deps[0].to_string(), "html5lib < 0.99999999");

        let deps = parse_dependency_list("six>=1.7.3").unwrap();
        assert_eq!(deps[0].to_string(), "six >= 1.7.3");
    }

    #[test]
    fn test_parse_missing_version_fails() {
        let err = parse_dependency_list("nodeconductor >").unwrap_err();
        assert!(err.to_string().contains("missing version"));
    }

    #[test]
    fn test_parse_operator_without_name_fails() {
        assert!(parse_dependency_list(">= 1.0").is_err());
    }

    #[test]
    fn test_from_str_single() {
        let dep: DependencyConstraint = "dep > 1.2.3".parse().unwrap();
        assert_eq!(dep.name, "dep");
        assert!("a, b".parse::<DependencyConstraint>().is_err());
    }

    #[test]
    fn test_is_satisfied_by() {
        let dep: DependencyConstraint = "dep > 1.2.3".parse().unwrap();
        assert!(!dep.is_satisfied_by(&"1.2.0".parse().unwrap()));
        assert!(dep.is_satisfied_by(&"1.3.0".parse().unwrap()));

        let any = DependencyConstraint::any("dep");
        assert!(any.is_satisfied_by(&"0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_set_rejects_duplicate_names() {
        let mut set = DependencySet::new();
        set.insert("a > 1".parse().unwrap()).unwrap();
        set.insert("b".parse().unwrap()).unwrap();

        let err = set.insert("a < 2".parse().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Duplicate dependency 'a'"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_set_serializes_as_list() {
        let mut set = DependencySet::new();
        set.insert("six".parse().unwrap()).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"[{"name":"six"}]"#);
    }
}
