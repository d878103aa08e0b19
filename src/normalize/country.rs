use super::rules::{self, Action, Pattern, Rule};

const KOREA: Pattern = Pattern::Contains(&["korea"]);
const NORTHERN: Pattern = Pattern::Contains(&["north", "people", "pr"]);
const NOT_NORTHERN: Pattern = Pattern::Not(&NORTHERN);

/// Rewrite rules applied to a lowercased affiliation country.
///
/// NOTE: Ordering is important here. Rewrites replace the working string and later rules look at
/// the result, so e.g. "hong kong, china" must hit the Hong Kong rule before the China one.
pub static COUNTRY_RULES: &[Rule] = &[
    Rule {
        name: "russia",
        when: Pattern::Contains(&["russia"]),
        then: Action::Rewrite("russia"),
    },
    Rule {
        name: "north korea",
        when: Pattern::All(&[KOREA, NORTHERN]),
        then: Action::Rewrite("north korea"),
    },
    Rule {
        name: "south korea",
        when: Pattern::All(&[KOREA, NOT_NORTHERN]),
        then: Action::Rewrite("south korea"),
    },
    Rule {
        name: "hong kong",
        when: Pattern::Contains(&["hong kong", "hk"]),
        then: Action::Rewrite("hong kong"),
    },
    // Endonyms
    Rule {
        name: "algérie",
        when: Pattern::Contains(&["algérie"]),
        then: Action::Resolve("algeria"),
    },
    Rule {
        name: "türkiye",
        when: Pattern::Contains(&["türkiye"]),
        then: Action::Resolve("turkey"),
    },
    Rule {
        name: "belgique",
        when: Pattern::Contains(&["belgique"]),
        then: Action::Resolve("belgium"),
    },
    Rule {
        name: "deutschland",
        when: Pattern::Contains(&["deutschland"]),
        then: Action::Resolve("germany"),
    },
    Rule {
        name: "italia",
        when: Pattern::Contains(&["italia"]),
        then: Action::Resolve("italy"),
    },
    Rule {
        name: "méxico",
        when: Pattern::Contains(&["méxico"]),
        then: Action::Resolve("mexico"),
    },
    Rule {
        name: "españa",
        when: Pattern::Contains(&["españa"]),
        then: Action::Resolve("spain"),
    },
    Rule {
        name: "polska",
        when: Pattern::Contains(&["polska"]),
        then: Action::Resolve("poland"),
    },
    Rule {
        name: "sverige",
        when: Pattern::Contains(&["sverige"]),
        then: Action::Resolve("sweden"),
    },
    Rule {
        name: "danmark",
        when: Pattern::Contains(&["danmark"]),
        then: Action::Resolve("denmark"),
    },
    // USA variants
    Rule {
        name: "united states",
        when: Pattern::Contains(&["united state", "unites states", "america"]),
        then: Action::Resolve("usa"),
    },
    Rule {
        name: "us",
        when: Pattern::Equals(&["us"]),
        then: Action::Resolve("usa"),
    },
    // UK variants
    Rule {
        name: "britain",
        when: Pattern::Any(&[
            Pattern::Equals(&["uk"]),
            Pattern::Contains(&["great britain", "england"]),
        ]),
        then: Action::Rewrite("united kingdom"),
    },
    Rule {
        name: "northern ireland",
        when: Pattern::Contains(&["northern ireland"]),
        then: Action::Rewrite("united kingdom"),
    },
    Rule {
        name: "china",
        when: Pattern::Contains(&["prc", "china"]),
        then: Action::Rewrite("china"),
    },
];

/// Separators of multi-country affiliations, checked in this order.
const SEPARATORS: &[&str] = &[",", ";", "/", " and ", " - "];

/// Canonical country label for a free-text affiliation country.
///
/// Never fails and is idempotent. Lists ("France, Germany") resolve to their first entry.
pub fn country(raw: &str) -> String {
    let lower = canonical_lower(raw);
    if lower == "usa" {
        "USA".to_string()
    } else {
        title_case(&lower)
    }
}

fn canonical_lower(raw: &str) -> String {
    let cleaned = clean(raw);
    let out = rules::apply(COUNTRY_RULES, &cleaned);
    if out.resolved {
        return out.value;
    }
    match first_segment(&out.value) {
        Some(head) => canonical_lower(head),
        None => out.value,
    }
}

fn clean(raw: &str) -> String {
    let lowered = raw.to_lowercase().replace('.', "");
    let mut s = lowered.trim();
    while let Some(rest) = s.strip_prefix("the ") {
        s = rest.trim_start();
    }
    s.to_string()
}

fn first_segment(s: &str) -> Option<&str> {
    SEPARATORS
        .iter()
        .find_map(|sep| s.split_once(sep).map(|(head, _)| head))
}

/// Uppercase the first letter of every word, a word starting after any non-letter.
///
/// Letters whose uppercase form would not lowercase back to themselves are left alone, so
/// lowercasing the result always gives back the input.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start && c.is_lowercase() && c != 'σ' && c != 'ς' {
            let mut upper = c.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(u), None) if u.to_lowercase().eq(std::iter::once(c)) => out.push(u),
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
        at_word_start = !c.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::Strategy;

    #[test]
    fn known_spellings() {
        let cases = [
            ("Deutschland", "Germany"),
            ("USA", "USA"),
            ("U.S.", "USA"),
            ("us", "USA"),
            ("United States of America", "USA"),
            ("The Netherlands", "Netherlands"),
            ("Republic of Korea", "South Korea"),
            ("Korea, Democratic People's Republic of", "North Korea"),
            ("Hong Kong SAR, China", "Hong Kong"),
            ("P.R. China", "China"),
            ("Russian Federation", "Russia"),
            ("UK", "United Kingdom"),
            ("England", "United Kingdom"),
            ("Northern Ireland", "United Kingdom"),
            ("España", "Spain"),
            ("Türkiye", "Turkey"),
            ("Côte d'Ivoire", "Côte D'Ivoire"),
            ("  india ", "India"),
            ("", ""),
        ];
        for (input, expected) in cases {
            assert_eq!(country(input), expected, "country({input:?})");
        }
    }

    #[test]
    fn first_listed_country_wins() {
        assert_eq!(country("France, Germany"), country("France"));
        assert_eq!(country("Japan; Canada"), "Japan");
        assert_eq!(country("Belgium/Netherlands"), "Belgium");
        assert_eq!(country("Trinidad and Tobago"), "Trinidad");
        assert_eq!(country("Spain - Portugal"), "Spain");
    }

    #[test]
    fn endonyms_resolve_before_list_splitting() {
        assert_eq!(country("Deutschland, France"), "Germany");
        assert_eq!(country("Sverige / Norway"), "Sweden");
    }

    #[test]
    fn canonical_names_are_fixed_points() {
        for rule in COUNTRY_RULES {
            let (Action::Rewrite(name) | Action::Resolve(name)) = rule.then else {
                continue;
            };
            let label = country(name);
            assert_eq!(country(&label), label, "rule {}", rule.name);
        }
    }

    #[test]
    fn title_case_round_trips_through_lowercase() {
        assert_eq!(title_case("new zealand"), "New Zealand");
        assert_eq!(title_case("österreich"), "Österreich");
        assert_eq!(title_case("ßa"), "ßa");
    }

    fn affiliation_like() -> impl Strategy<Value = String> {
        let words = proptest::sample::select(vec![
            "the ", "USA", "U.S.", "china", "Korea", "north", ", ", "; ", "/", " and ", " - ",
            "Deutschland", "hk", "England", "σ", "Σ", "'", ".", " ", "İ", "ß",
        ]);
        proptest::collection::vec(words, 0..8).prop_map(|v| v.concat())
    }

    #[test]
    fn country_is_idempotent() {
        proptest::proptest!(|(s in "\\PC{0,40}")| {
            let once = country(&s);
            proptest::prop_assert_eq!(country(&once), once);
        });
        proptest::proptest!(|(s in affiliation_like())| {
            let once = country(&s);
            proptest::prop_assert_eq!(country(&once), once);
        });
    }

    #[test]
    fn country_is_total() {
        proptest::proptest!(|(s in proptest::string::string_regex(".{0,64}").unwrap())| {
            let _ = country(&s);
        })
    }
}
