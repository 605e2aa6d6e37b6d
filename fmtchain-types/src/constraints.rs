//! Interpreter version constraints.
//!
//! A [`RuntimeConstraints`] value is a disjunction of [`Requirement`]s; each requirement is a
//! conjunction of version comparators for one interpreter implementation, written the usual
//! way: `CPython>=3.6,<4`. A bare `>=3.6` means `CPython>=3.6`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_INTERPRETER: &str = "CPython";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintParseError {
    #[error("empty constraint")]
    Empty,
    #[error("invalid version `{0}`")]
    InvalidVersion(String),
    #[error("invalid comparator `{0}`")]
    InvalidComparator(String),
}

/// An interpreter version.
///
/// Without a patch level it names a release series. As a membership query `3.7` means "any
/// `3.7.x`"; as an ordering bound it means `3.7.0`; under `==`/`!=` it matches the whole series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            patch: None,
        }
    }

    pub const fn with_patch(self, patch: u32) -> Self {
        Self {
            patch: Some(patch),
            ..self
        }
    }

    pub fn is_series(&self) -> bool {
        self.patch.is_none()
    }

    fn same_series(&self, other: &Version) -> bool {
        (self.major, self.minor) == (other.major, other.minor)
    }

    fn release(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch.unwrap_or(0))
    }

    fn at(&self, patch: u32) -> (u32, u32, u32) {
        (self.major, self.minor, patch)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.patch {
            Some(patch) => write!(f, "{}.{}.{}", self.major, self.minor, patch),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

impl FromStr for Version {
    type Err = ConstraintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches(".*");
        let mut parts = trimmed.split('.');
        let parse = |p: Option<&str>| -> Result<Option<u32>, ConstraintParseError> {
            match p {
                None => Ok(None),
                Some(p) => p
                    .parse::<u32>()
                    .map(Some)
                    .map_err(|_| ConstraintParseError::InvalidVersion(s.to_string())),
            }
        };
        let major = parse(parts.next())?
            .ok_or_else(|| ConstraintParseError::InvalidVersion(s.to_string()))?;
        let minor = parse(parts.next())?.unwrap_or(0);
        let patch = parse(parts.next())?;
        if parts.next().is_some() {
            return Err(ConstraintParseError::InvalidVersion(s.to_string()));
        }
        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Op {
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
    Ne,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Ge => ">=",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Lt => "<",
            Op::Eq => "==",
            Op::Ne => "!=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    /// Whether `v` satisfies this comparator; for a series, whether any release in it does.
    pub fn matches(&self, v: Version) -> bool {
        matches_all(std::slice::from_ref(self), v)
    }

    fn accepts(&self, release: (u32, u32, u32)) -> bool {
        let bound = self.version.release();
        let series = (release.0, release.1) == (bound.0, bound.1);
        match self.op {
            Op::Eq if self.version.is_series() => series,
            Op::Ne if self.version.is_series() => !series,
            Op::Ge => release >= bound,
            Op::Gt => release > bound,
            Op::Le => release <= bound,
            Op::Lt => release < bound,
            Op::Eq => release == bound,
            Op::Ne => release != bound,
        }
    }

    /// `self` excludes at least as much from below as `other`.
    fn tighter_lower(&self, other: &Comparator) -> bool {
        let key = |c: &Comparator| (c.version.release(), c.op == Op::Gt);
        key(self) > key(other) || (key(self) == key(other) && self < other)
    }

    /// `self` excludes at least as much from above as `other`.
    fn tighter_upper(&self, other: &Comparator) -> bool {
        let key = |c: &Comparator| (c.version.release(), c.op == Op::Le);
        key(self) < key(other) || (key(self) == key(other) && self < other)
    }
}

/// Patch levels deciding whether some release of `series` passes every comparator: zero, plus
/// each bound inside the series and the level just above it. Between those points the
/// outcome cannot change.
fn series_patches(comparators: &[Comparator], series: Version) -> Vec<u32> {
    let mut out = vec![0];
    for c in comparators.iter().filter(|c| c.version.same_series(&series)) {
        let patch = c.version.patch.unwrap_or(0);
        out.push(patch);
        out.push(patch.saturating_add(1));
    }
    out.sort_unstable();
    out.dedup();
    out
}

fn matches_all(comparators: &[Comparator], v: Version) -> bool {
    let accepts = |patch: u32| comparators.iter().all(|c| c.accepts(v.at(patch)));
    match v.patch {
        Some(patch) => accepts(patch),
        None => series_patches(comparators, v).into_iter().any(accepts),
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `<4` reads better than `<4.0`.
        if self.version.minor == 0
            && self.version.is_series()
            && matches!(self.op, Op::Lt | Op::Ge)
        {
            write!(f, "{}{}", self.op.symbol(), self.version.major)
        } else {
            write!(f, "{}{}", self.op.symbol(), self.version)
        }
    }
}

impl FromStr for Comparator {
    type Err = ConstraintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Two-character operators first so `>=` is not read as `>`.
        let ops = [
            (">=", Op::Ge),
            ("<=", Op::Le),
            ("==", Op::Eq),
            ("!=", Op::Ne),
            (">", Op::Gt),
            ("<", Op::Lt),
        ];
        for (symbol, op) in ops {
            if let Some(rest) = s.strip_prefix(symbol) {
                return Ok(Self {
                    op,
                    version: rest.parse()?,
                });
            }
        }
        Err(ConstraintParseError::InvalidComparator(s.to_string()))
    }
}

/// One interpreter implementation plus a conjunction of comparators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Requirement {
    pub interpreter: String,
    pub comparators: Vec<Comparator>,
}

impl Requirement {
    /// Keeps only the tightest lower and upper bound; `==`/`!=` are kept as written.
    fn normalized(self) -> Self {
        let mut lower: Option<Comparator> = None;
        let mut upper: Option<Comparator> = None;
        let mut comparators = Vec::new();
        for c in self.comparators {
            match c.op {
                Op::Ge | Op::Gt => {
                    if lower.is_none_or(|l| c.tighter_lower(&l)) {
                        lower = Some(c);
                    }
                }
                Op::Le | Op::Lt => {
                    if upper.is_none_or(|u| c.tighter_upper(&u)) {
                        upper = Some(c);
                    }
                }
                Op::Eq | Op::Ne => comparators.push(c),
            }
        }
        comparators.extend(lower);
        comparators.extend(upper);
        comparators.sort();
        comparators.dedup();
        Self {
            interpreter: self.interpreter,
            comparators,
        }
    }

    pub fn matches(&self, v: Version) -> bool {
        matches_all(&self.comparators, v)
    }

    /// Both requirements at once, or `None` when the interpreters differ.
    pub fn and(&self, other: &Requirement) -> Option<Requirement> {
        if self.interpreter != other.interpreter {
            return None;
        }
        let mut comparators = self.comparators.clone();
        comparators.extend(other.comparators.iter().copied());
        Some(
            Requirement {
                interpreter: self.interpreter.clone(),
                comparators,
            }
            .normalized(),
        )
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.interpreter)?;
        let parts: Vec<String> = self.comparators.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for Requirement {
    type Err = ConstraintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConstraintParseError::Empty);
        }
        let split = s.find(['<', '>', '=', '!']).unwrap_or(s.len());
        let (name, rest) = s.split_at(split);
        let interpreter = match name.trim() {
            "" => DEFAULT_INTERPRETER.to_string(),
            other => other.to_string(),
        };
        let comparators = rest
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Comparator>, _>>()?;
        Ok(Requirement {
            interpreter,
            comparators,
        }
        .normalized())
    }
}

/// Disjunction of requirements. An empty set is unsatisfiable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct RuntimeConstraints {
    requirements: Vec<Requirement>,
}

impl RuntimeConstraints {
    pub fn new(requirements: impl IntoIterator<Item = Requirement>) -> Self {
        let mut requirements: Vec<Requirement> = requirements
            .into_iter()
            .map(Requirement::normalized)
            .collect();
        requirements.sort();
        requirements.dedup();
        Self { requirements }
    }

    /// Any version of the default interpreter.
    pub fn any() -> Self {
        Self::new([Requirement {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            comparators: Vec::new(),
        }])
    }

    pub fn parse<I, S>(items: I) -> Result<Self, ConstraintParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requirements = items
            .into_iter()
            .map(|s| s.as_ref().parse::<Requirement>())
            .collect::<Result<Vec<_>, _>>()?;
        if requirements.is_empty() {
            return Err(ConstraintParseError::Empty);
        }
        Ok(Self::new(requirements))
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Constraints satisfied by exactly the versions both sides accept.
    pub fn intersect(&self, other: &RuntimeConstraints) -> RuntimeConstraints {
        let mut out = Vec::new();
        for a in &self.requirements {
            for b in &other.requirements {
                if let Some(both) = a.and(b) {
                    out.push(both);
                }
            }
        }
        Self::new(out)
    }

    /// Intersection of every item; `None` when `items` is empty.
    pub fn intersect_all<'a>(
        items: impl IntoIterator<Item = &'a RuntimeConstraints>,
    ) -> Option<RuntimeConstraints> {
        let mut distinct: Vec<&RuntimeConstraints> = Vec::new();
        for c in items {
            if !distinct.contains(&c) {
                distinct.push(c);
            }
        }
        let (first, rest) = distinct.split_first()?;
        Some(
            rest.iter()
                .fold((*first).clone(), |acc, next| acc.intersect(next)),
        )
    }

    pub fn contains(&self, v: Version) -> bool {
        self.requirements.iter().any(|r| r.matches(v))
    }

    /// True when no version of `universe` below `threshold` satisfies these constraints.
    pub fn requires_at_least(&self, threshold: Version, universe: &[Version]) -> bool {
        !universe
            .iter()
            .filter(|v| v.release() < threshold.release())
            .any(|v| self.contains(*v))
    }

    /// Lowest version of `universe` accepted by these constraints.
    pub fn minimum_version(&self, universe: &[Version]) -> Option<Version> {
        universe.iter().copied().filter(|v| self.contains(*v)).min()
    }
}

impl fmt::Display for RuntimeConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requirements.is_empty() {
            return f.write_str("<unsatisfiable>");
        }
        let parts: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        f.write_str(&parts.join(" OR "))
    }
}

impl TryFrom<Vec<String>> for RuntimeConstraints {
    type Error = ConstraintParseError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RuntimeConstraints> for Vec<String> {
    fn from(value: RuntimeConstraints) -> Self {
        value.requirements.iter().map(|r| r.to_string()).collect()
    }
}

/// The CPython releases a constraint is evaluated against when no universe is configured.
pub fn default_universe() -> Vec<Version> {
    let mut out = vec![Version::new(2, 7)];
    out.extend((5..=13).map(|minor| Version::new(3, minor)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ic(items: &[&str]) -> RuntimeConstraints {
        RuntimeConstraints::parse(items).expect("valid constraints")
    }

    #[test]
    fn parses_bare_and_named_requirements() {
        let c = ic(&[">=3.6,<4"]);
        assert_eq!(c.to_string(), "CPython>=3.6,<4");
        let c = ic(&["PyPy==3.9"]);
        assert_eq!(c.requirements()[0].interpreter, "PyPy");
        assert!(c.contains(Version::new(3, 9)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            "CPython=3".parse::<Requirement>(),
            Err(ConstraintParseError::InvalidComparator(_))
        ));
        assert!(matches!(
            RuntimeConstraints::parse(Vec::<String>::new()),
            Err(ConstraintParseError::Empty)
        ));
        assert!(">=three".parse::<Requirement>().is_err());
    }

    #[test]
    fn wildcards_and_bare_equality_name_a_series() {
        let c = ic(&["==3.8.*"]);
        assert!(c.contains(Version::new(3, 8)));
        assert!(c.contains(Version::new(3, 8).with_patch(12)));
        assert!(!c.contains(Version::new(3, 9)));
        assert_eq!(c, ic(&["==3.8"]));
    }

    #[test]
    fn patch_levels_are_kept() {
        assert_eq!(
            "3.10.4".parse::<Version>().unwrap(),
            Version::new(3, 10).with_patch(4)
        );
        assert_eq!(ic(&[">3.7.2"]).to_string(), "CPython>3.7.2");
        assert!("3.10.4.1".parse::<Version>().is_err());
    }

    #[test]
    fn excluding_a_patch_release_keeps_the_rest_of_the_series() {
        let c = ic(&[">=3.7,!=3.7.0"]);
        assert_eq!(c.to_string(), "CPython>=3.7,!=3.7.0");
        assert!(c.contains(Version::new(3, 7)));
        assert!(c.contains(Version::new(3, 7).with_patch(1)));
        assert!(!c.contains(Version::new(3, 7).with_patch(0)));
        assert!(!c.contains(Version::new(3, 6)));
    }

    #[test]
    fn strict_lower_patch_bound_admits_later_patches() {
        let c = ic(&[">3.7.2"]);
        assert!(c.contains(Version::new(3, 7)));
        assert!(c.contains(Version::new(3, 7).with_patch(3)));
        assert!(!c.contains(Version::new(3, 7).with_patch(2)));
        assert!(!c.contains(Version::new(3, 6)));
        assert!(c.contains(Version::new(3, 8)));
    }

    #[test]
    fn inclusive_upper_patch_bound_stops_inside_the_series() {
        let c = ic(&["<=3.7.2"]);
        assert!(c.contains(Version::new(3, 7)));
        assert!(c.contains(Version::new(3, 7).with_patch(2)));
        assert!(!c.contains(Version::new(3, 7).with_patch(3)));
        assert!(!c.contains(Version::new(3, 8)));
    }

    #[test]
    fn a_series_needs_one_release_passing_every_comparator() {
        let c = ic(&[">3.7.2,<3.7.3"]);
        assert!(!c.contains(Version::new(3, 7)));
        let c = ic(&[">3.7.2,<3.7.5,!=3.7.3"]);
        assert!(c.contains(Version::new(3, 7)));
        assert!(c.contains(Version::new(3, 7).with_patch(4)));
    }

    #[test]
    fn redundant_bounds_collapse() {
        assert_eq!(ic(&[">=3.6,>=3.8"]).to_string(), "CPython>=3.8");
        assert_eq!(ic(&["<4,<=3.9"]).to_string(), "CPython<=3.9");
        assert_eq!(ic(&[">3.7,>=3.7"]).to_string(), "CPython>3.7");
        assert_eq!(ic(&["<3.9,<=3.9"]).to_string(), "CPython<3.9");
        assert_eq!(ic(&[">=3.7,>=3.7.0"]), ic(&[">=3.7.0,>=3.7"]));
        assert_eq!(ic(&["!=3.7.0,!=3.7.1"]).requirements()[0].comparators.len(), 2);
    }

    #[test]
    fn intersection_combines_comparators() {
        let a = ic(&[">=3.6"]);
        let b = ic(&[">=3.8"]);
        let both = a.intersect(&b);
        assert!(!both.contains(Version::new(3, 7)));
        assert!(both.contains(Version::new(3, 8)));
    }

    #[test]
    fn intersection_of_different_interpreters_is_unsatisfiable() {
        let both = ic(&["CPython>=3.6"]).intersect(&ic(&["PyPy>=3.6"]));
        assert!(both.requirements().is_empty());
        assert_eq!(both.minimum_version(&default_universe()), None);
    }

    #[test]
    fn disjunctions_distribute() {
        let a = ic(&["==2.7", ">=3.6"]);
        let b = ic(&["<3.9"]);
        let both = a.intersect(&b);
        assert!(both.contains(Version::new(2, 7)));
        assert!(both.contains(Version::new(3, 8)));
        assert!(!both.contains(Version::new(3, 9)));
    }

    #[test]
    fn requires_at_least_checks_the_universe() {
        let universe = default_universe();
        let threshold = Version::new(3, 8);
        assert!(ic(&[">=3.8"]).requires_at_least(threshold, &universe));
        assert!(ic(&["==3.9"]).requires_at_least(threshold, &universe));
        assert!(!ic(&[">=3.6"]).requires_at_least(threshold, &universe));
        assert!(!ic(&["==2.7", ">=3.8"]).requires_at_least(threshold, &universe));
        assert!(!ic(&[">=3.7,!=3.7.0"]).requires_at_least(threshold, &universe));
        assert!(!ic(&[">3.7.2"]).requires_at_least(threshold, &universe));
    }

    #[test]
    fn intersect_all_dedupes_and_handles_empty() {
        assert_eq!(RuntimeConstraints::intersect_all(std::iter::empty()), None);
        let a = ic(&[">=3.6"]);
        let b = ic(&[">=3.8"]);
        let all = RuntimeConstraints::intersect_all([&a, &b, &a]).unwrap();
        assert_eq!(all.to_string(), "CPython>=3.8");
    }

    #[test]
    fn serde_uses_string_lists() {
        let c = ic(&[">=3.7,<4"]);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"["CPython>=3.7,<4"]"#);
        let back: RuntimeConstraints = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    fn arb_version() -> impl Strategy<Value = Version> {
        (2u32..=3, 0u32..=13, prop::option::of(0u32..=5)).prop_map(|(major, minor, patch)| {
            let v = Version::new(major, minor);
            match patch {
                Some(p) => v.with_patch(p),
                None => v,
            }
        })
    }

    fn arb_release() -> impl Strategy<Value = Version> {
        (2u32..=3, 0u32..=13, 0u32..=8)
            .prop_map(|(major, minor, patch)| Version::new(major, minor).with_patch(patch))
    }

    /// Direct reading of one comparator against one concrete release.
    fn reference_accepts(c: &Comparator, v: Version) -> bool {
        let release = (v.major, v.minor, v.patch.unwrap_or(0));
        let bound = (c.version.major, c.version.minor, c.version.patch.unwrap_or(0));
        let same_series = (v.major, v.minor) == (c.version.major, c.version.minor);
        match (c.op, c.version.patch) {
            (Op::Eq, None) => same_series,
            (Op::Ne, None) => !same_series,
            (Op::Eq, Some(_)) => release == bound,
            (Op::Ne, Some(_)) => release != bound,
            (Op::Ge, _) => release >= bound,
            (Op::Gt, _) => release > bound,
            (Op::Le, _) => release <= bound,
            (Op::Lt, _) => release < bound,
        }
    }

    fn arb_constraints() -> impl Strategy<Value = RuntimeConstraints> {
        prop::collection::vec((arb_version(), 0usize..6), 1..3).prop_map(|items| {
            let ops = [Op::Ge, Op::Gt, Op::Le, Op::Lt, Op::Eq, Op::Ne];
            RuntimeConstraints::new(items.into_iter().map(|(version, op)| Requirement {
                interpreter: DEFAULT_INTERPRETER.to_string(),
                comparators: vec![Comparator {
                    op: ops[op],
                    version,
                }],
            }))
        })
    }

    proptest! {
        #[test]
        fn intersection_is_membership_conjunction(
            a in arb_constraints(),
            b in arb_constraints(),
            v in arb_release(),
        ) {
            prop_assert_eq!(a.intersect(&b).contains(v), a.contains(v) && b.contains(v));
        }

        #[test]
        fn intersection_commutes(a in arb_constraints(), b in arb_constraints()) {
            prop_assert_eq!(a.intersect(&b), b.intersect(&a));
        }

        #[test]
        fn release_membership_matches_reference(c in arb_constraints(), v in arb_release()) {
            let expected = c
                .requirements()
                .iter()
                .any(|r| r.comparators.iter().all(|cmp| reference_accepts(cmp, v)));
            prop_assert_eq!(c.contains(v), expected);
        }

        #[test]
        fn series_membership_is_some_release(
            a in arb_constraints(),
            b in arb_constraints(),
            major in 2u32..=3,
            minor in 0u32..=13,
        ) {
            let c = a.intersect(&b);
            let series = Version::new(major, minor);
            let any_release = (0..=8).any(|p| c.contains(series.with_patch(p)));
            prop_assert_eq!(c.contains(series), any_release);
        }
    }
}
