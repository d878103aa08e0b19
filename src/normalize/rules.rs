//! A small ordered rewrite-rule engine.
//!
//! A rule set is a static slice of [`Rule`]s evaluated top to bottom against a working string.
//! Later rules see the output of earlier rewrites, so the order of a rule set is part of its
//! behaviour.

/// A condition on the working string.
#[derive(Debug, Clone, Copy)]
pub enum Pattern {
    /// The string contains any of the needles.
    Contains(&'static [&'static str]),
    /// The string is exactly one of the values.
    Equals(&'static [&'static str]),
    /// Every sub-pattern matches.
    All(&'static [Pattern]),
    /// At least one sub-pattern matches.
    Any(&'static [Pattern]),
    Not(&'static Pattern),
}

impl Pattern {
    pub fn matches(&self, s: &str) -> bool {
        match self {
            Pattern::Contains(needles) => needles.iter().any(|n| s.contains(n)),
            Pattern::Equals(values) => values.contains(&s),
            Pattern::All(patterns) => patterns.iter().all(|p| p.matches(s)),
            Pattern::Any(patterns) => patterns.iter().any(|p| p.matches(s)),
            Pattern::Not(p) => !p.matches(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Replace the whole string and carry on with the next rule.
    Rewrite(&'static str),
    /// Replace the whole string and stop.
    Resolve(&'static str),
    /// Delete every occurrence of the substring and stop.
    Strip(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub when: Pattern,
    pub then: Action,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub value: String,
    /// Whether a rule ended evaluation early.
    pub resolved: bool,
}

/// Run `input` through `rules` in order.
pub fn apply(rules: &[Rule], input: &str) -> Outcome {
    let mut value = input.to_string();
    for rule in rules {
        if !rule.when.matches(&value) {
            continue;
        }
        log::trace!("rule {:?} matched {value:?}", rule.name);
        match rule.then {
            Action::Rewrite(to) => value = to.to_string(),
            Action::Resolve(to) => {
                return Outcome {
                    value: to.to_string(),
                    resolved: true,
                };
            }
            Action::Strip(needle) => {
                return Outcome {
                    value: value.replace(needle, ""),
                    resolved: true,
                };
            }
        }
    }
    Outcome {
        value,
        resolved: false,
    }
}
