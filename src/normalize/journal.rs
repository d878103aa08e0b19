use super::rules::{self, Action, Pattern, Rule};

const EUROPEAN: Pattern = Pattern::Contains(&["A European Journal"]);
const CHEMISTRY: Pattern = Pattern::Contains(&["Chemistry"]);

/// Known variant spellings of journal names. The first matching rule wins.
pub static JOURNAL_RULES: &[Rule] = &[
    // Angewandte references are split between two journal names
    Rule {
        name: "international edition",
        when: Pattern::Contains(&[" International Edition"]),
        then: Action::Strip(" International Edition"),
    },
    Rule {
        name: "chem eur j",
        when: Pattern::All(&[EUROPEAN, CHEMISTRY]),
        then: Action::Resolve("Chemistry: A European Journal"),
    },
    Rule {
        name: "acta cryst b",
        when: Pattern::Contains(&["Acta Crystallographica Section B"]),
        then: Action::Resolve("Acta Crystallographica B"),
    },
];

/// Merge known variant spellings of a journal name.
pub fn journal(name: &str) -> String {
    rules::apply(JOURNAL_RULES, name).value
}
