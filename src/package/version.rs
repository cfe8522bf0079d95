//! Version ordering and version constraints.
//!
//! Versions follow RPM ordering: `[epoch:]version[-release]`, compared
//! segment by segment where numeric runs compare numerically, alphabetic
//! runs compare lexically, numeric beats alphabetic, and `~` sorts before
//! anything (so `1.0~rc1 < 1.0`).

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// A package version as `[epoch:]version[-release]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl Version {
    /// Compare two versions.
    ///
    /// The release is only taken into account when both sides carry one, so
    /// `1.0` matches `1.0-3` in either direction.
    pub fn compare(&self, other: &Version) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_segments(&self.version, &other.version))
            .then_with(|| match (&self.release, &other.release) {
                (Some(a), Some(b)) => compare_segments(a, b),
                _ => Ordering::Equal,
            })
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            bail!("Invalid version: version cannot be empty");
        }

        let (epoch, rest) = match s.split_once(':') {
            Some((epoch, rest)) => {
                let epoch = epoch
                    .parse::<u64>()
                    .map_err(|_| anyhow!("Invalid epoch in version '{}'", s))?;
                (epoch, rest)
            }
            None => (0, s),
        };

        let (version, release) = match rest.rsplit_once('-') {
            Some((version, release)) if !release.is_empty() => {
                (version, Some(release.to_string()))
            }
            Some(_) => bail!("Invalid version '{}': release after '-' cannot be empty", s),
            None => (rest, None),
        };

        if version.is_empty() {
            bail!("Invalid version '{}': missing version part", s);
        }
        if version.chars().any(char::is_whitespace) {
            bail!("Invalid version '{}': whitespace is not allowed", s);
        }

        Ok(Version {
            epoch,
            version: version.to_string(),
            release,
        })
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(release) = &self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

/// Segment-wise RPM version comparison.
pub fn compare_segments(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let is_separator = |c: char| !c.is_ascii_alphanumeric() && c != '~' && c != '^';
    let mut one = a;
    let mut two = b;

    while !one.is_empty() || !two.is_empty() {
        one = one.trim_start_matches(is_separator);
        two = two.trim_start_matches(is_separator);

        // Tilde sorts before everything, even the end of the string.
        if one.starts_with('~') || two.starts_with('~') {
            if !one.starts_with('~') {
                return Ordering::Greater;
            }
            if !two.starts_with('~') {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        // Caret sorts after the end of the string but before anything else.
        if one.starts_with('^') || two.starts_with('^') {
            if one.is_empty() {
                return Ordering::Less;
            }
            if two.is_empty() {
                return Ordering::Greater;
            }
            if !one.starts_with('^') {
                return Ordering::Greater;
            }
            if !two.starts_with('^') {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = one.starts_with(|c: char| c.is_ascii_digit());
        let (seg_one, rest_one) = split_run(one, numeric);
        let (seg_two, rest_two) = split_run(two, numeric);

        // Segments of different types: numeric is newer.
        if seg_two.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ordering = if numeric {
            let n_one = seg_one.trim_start_matches('0');
            let n_two = seg_two.trim_start_matches('0');
            n_one.len().cmp(&n_two.len()).then_with(|| n_one.cmp(n_two))
        } else {
            seg_one.cmp(seg_two)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }

        one = rest_one;
        two = rest_two;
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

fn split_run(s: &str, numeric: bool) -> (&str, &str) {
    let end = s
        .find(|c: char| {
            if numeric {
                !c.is_ascii_digit()
            } else {
                !c.is_ascii_alphabetic()
            }
        })
        .unwrap_or(s.len());
    s.split_at(end)
}

/// Comparison operator of a version constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = ">")]
    Greater,
}

impl Op {
    /// True if an available version whose comparison against the required
    /// version yields `ordering` satisfies this operator.
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Op::Less => ordering == Ordering::Less,
            Op::LessEqual => ordering != Ordering::Greater,
            Op::Equal => ordering == Ordering::Equal,
            Op::GreaterEqual => ordering != Ordering::Less,
            Op::Greater => ordering == Ordering::Greater,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Op::Less => "<",
            Op::LessEqual => "<=",
            Op::Equal => "=",
            Op::GreaterEqual => ">=",
            Op::Greater => ">",
        }
    }
}

impl FromStr for Op {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Op::Less),
            "<=" | "=<" => Ok(Op::LessEqual),
            "=" | "==" => Ok(Op::Equal),
            ">=" | "=>" => Ok(Op::GreaterEqual),
            ">" => Ok(Op::Greater),
            _ => Err(anyhow!("Unknown version operator '{}'", s)),
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operator and the version it compares against, e.g. `> 0.109.0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionConstraint {
    pub op: Op,
    pub version: Version,
}

impl VersionConstraint {
    pub fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    pub fn matches(&self, candidate: &Version) -> bool {
        self.op.accepts(candidate.compare(&self.version))
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.op, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_plain_version() {
        let version = v("0.109.0");
        assert_eq!(version.epoch, 0);
        assert_eq!(version.version, "0.109.0");
        assert_eq!(version.release, None);
    }

    #[test]
    fn test_parse_epoch_and_release() {
        let version = v("2:1.4.0-3.el7");
        assert_eq!(version.epoch, 2);
        assert_eq!(version.version, "1.4.0");
        assert_eq!(version.release.as_deref(), Some("3.el7"));
        assert_eq!(version.to_string(), "2:1.4.0-3.el7");
    }

    #[test]
    fn test_parse_invalid_versions() {
        assert!("".parse::<Version>().is_err());
        assert!("x:1.0".parse::<Version>().is_err());
        assert!("1.0-".parse::<Version>().is_err());
        assert!("1.0 beta".parse::<Version>().is_err());
    }

    #[test]
    fn test_compare_numeric_segments() {
        assert_eq!(compare_segments("1.2.3", "1.2.0"), Ordering::Greater);
        assert_eq!(compare_segments("0.110.0", "0.109.0"), Ordering::Greater);
        assert_eq!(compare_segments("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_segments("1.01", "1.1"), Ordering::Equal);
    }

    #[test]
    fn test_compare_long_numeric_segment() {
        // html5lib pins below 0.99999999
        assert_eq!(compare_segments("0.9999999", "0.99999999"), Ordering::Less);
        assert_eq!(compare_segments("1.0", "0.99999999"), Ordering::Greater);
    }

    #[test]
    fn test_compare_alpha_and_numeric() {
        assert_eq!(compare_segments("1.0a", "1.0"), Ordering::Greater);
        assert_eq!(compare_segments("1.0.1", "1.0a"), Ordering::Greater);
        assert_eq!(compare_segments("2.0b", "2.0a"), Ordering::Greater);
    }

    #[test]
    fn test_compare_tilde_and_caret() {
        assert_eq!(compare_segments("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(compare_segments("1.0~rc1", "1.0~rc2"), Ordering::Less);
        assert_eq!(compare_segments("1.0^git1", "1.0"), Ordering::Greater);
        assert_eq!(compare_segments("1.0^git1", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_compare_separators_are_equivalent() {
        assert_eq!(compare_segments("1.0_1", "1.0.1"), Ordering::Equal);
    }

    #[test]
    fn test_version_compare_epoch_wins() {
        assert_eq!(v("1:0.1").compare(&v("9.9")), Ordering::Greater);
    }

    #[test]
    fn test_version_compare_release_only_when_both_present() {
        assert_eq!(v("1.0-2").compare(&v("1.0-10")), Ordering::Less);
        assert_eq!(v("1.0-2").compare(&v("1.0")), Ordering::Equal);
        assert_eq!(v("1.0").compare(&v("1.0-2")), Ordering::Equal);
    }

    #[test]
    fn test_op_parse() {
        assert_eq!("<".parse::<Op>().unwrap(), Op::Less);
        assert_eq!("==".parse::<Op>().unwrap(), Op::Equal);
        assert_eq!("=>".parse::<Op>().unwrap(), Op::GreaterEqual);
        assert!("~=".parse::<Op>().is_err());
    }

    #[test]
    fn test_constraint_greater_rejects_older() {
        let constraint = VersionConstraint::new(Op::Greater, v("1.2.3"));
        assert!(!constraint.matches(&v("1.2.0")));
        assert!(!constraint.matches(&v("1.2.3")));
        assert!(constraint.matches(&v("1.2.4")));
    }

    #[test]
    fn test_constraint_boundaries() {
        let version = v("0.3.5");
        assert!(VersionConstraint::new(Op::GreaterEqual, version.clone()).matches(&v("0.3.5")));
        assert!(VersionConstraint::new(Op::LessEqual, version.clone()).matches(&v("0.3.5")));
        assert!(VersionConstraint::new(Op::Equal, version.clone()).matches(&v("0.3.5-1")));
        assert!(!VersionConstraint::new(Op::Less, version).matches(&v("0.3.5")));
    }

    #[test]
    fn test_constraint_display() {
        let constraint = VersionConstraint::new(Op::Greater, v("0.109.0"));
        assert_eq!(constraint.to_string(), "> 0.109.0");
    }
}
