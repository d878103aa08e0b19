//! Best-effort journal lookup for published preprints.
//!
//! Failures are per DOI: they are logged and left for the next run, never fatal to the batch.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{
    api::USER_AGENT,
    progress::Progress,
    snapshot::{JournalCache, Snapshot},
};

pub const CROSSREF_BASE_URL: &str = "https://api.crossref.org";

const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

static RESOLVER_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:doi:|urn:doi:|https?://(?:dx\.)?doi\.org/)").unwrap()
});
static PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^10\.\d{4,9}$").unwrap());

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("not a DOI: {0:?}")]
    InvalidDoi(String),
    #[error("request for {doi} failed")]
    Request {
        doi: String,
        #[source]
        source: ureq::Error,
    },
    #[error("HTTP {status} looking up {doi}")]
    Status { doi: String, status: u16 },
    #[error("unexpected metadata for {doi}")]
    Json {
        doi: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no container title recorded for {0}")]
    MissingContainerTitle(String),
}

/// Something that knows which journal published a DOI.
pub trait JournalSource {
    fn journal_of(&self, doi: &str) -> Result<String, LookupError>;
}

/// A DOI split into its registrant prefix and item suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Doi<'a> {
    pub prefix: &'a str,
    pub suffix: &'a str,
}

impl<'a> Doi<'a> {
    /// Split a bare DOI at its first `/`, tolerating `doi:` prefixes and resolver URLs.
    /// The suffix is kept verbatim.
    pub fn parse(s: &'a str) -> Option<Self> {
        let s = s.trim();
        let s = RESOLVER_PREFIX_RE
            .find(s)
            .map_or(s, |m| s[m.end()..].trim_start());

        let (prefix, suffix) = s.split_once('/')?;
        if !PREFIX_RE.is_match(prefix) || suffix.trim().is_empty() {
            return None;
        }
        Some(Doi { prefix, suffix })
    }

    /// Path of this DOI's record below a Crossref-style `works` endpoint.
    pub fn works_path(&self) -> String {
        let enc_suffix = utf8_percent_encode(self.suffix, PATH_SEGMENT_ENCODE_SET).to_string();
        format!("works/{}/{}", self.prefix, enc_suffix)
    }
}

/// Journal names from the Crossref REST API (`message.container-title[0]`).
pub struct Crossref {
    agent: ureq::Agent,
    base: Url,
}

#[derive(Deserialize)]
struct WorkResponse {
    message: WorkMessage,
}

#[derive(Deserialize)]
struct WorkMessage {
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
}

impl Crossref {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        Ok(Crossref {
            agent: ureq::Agent::new_with_defaults(),
            base,
        })
    }

    fn works_url(&self, doi: &Doi<'_>) -> String {
        // `works_path` is relative and already percent-encoded.
        self.base
            .join(&doi.works_path())
            .map(String::from)
            .unwrap_or_else(|_| format!("{}{}", self.base, doi.works_path()))
    }
}

impl JournalSource for Crossref {
    fn journal_of(&self, raw: &str) -> Result<String, LookupError> {
        let doi = Doi::parse(raw).ok_or_else(|| LookupError::InvalidDoi(raw.to_string()))?;
        let url = self.works_url(&doi);
        log::debug!("GET {url}");

        let mut res = match self.agent.get(&url).header("User-Agent", USER_AGENT).call() {
            Ok(res) => res,
            Err(ureq::Error::StatusCode(status)) => {
                return Err(LookupError::Status {
                    doi: raw.to_string(),
                    status,
                });
            }
            Err(source) => {
                return Err(LookupError::Request {
                    doi: raw.to_string(),
                    source,
                });
            }
        };
        let body = res
            .body_mut()
            .read_to_string()
            .map_err(|source| LookupError::Request {
                doi: raw.to_string(),
                source,
            })?;
        let work: WorkResponse =
            serde_json::from_str(&body).map_err(|source| LookupError::Json {
                doi: raw.to_string(),
                source,
            })?;
        work.message
            .container_title
            .into_iter()
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
            .ok_or_else(|| LookupError::MissingContainerTitle(raw.to_string()))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichStats {
    /// DOIs that needed a lookup.
    pub pending: usize,
    pub added: usize,
    pub failed: usize,
}

/// Look up the journal of every version-of-record DOI missing from `cache`.
///
/// Existing cache entries are never touched; failed lookups are skipped.
pub fn enrich(
    snapshot: &Snapshot,
    cache: &mut JournalCache,
    source: &impl JournalSource,
) -> EnrichStats {
    let pending: BTreeSet<&str> = snapshot
        .values()
        .filter_map(|p| p.vor_doi())
        .filter(|doi| !cache.contains(doi))
        .collect();

    let mut stats = EnrichStats {
        pending: pending.len(),
        ..Default::default()
    };
    log::info!("looking up journals for {} published preprints", stats.pending);

    let progress = Progress::new(stats.pending as u64, "journals");
    for doi in pending {
        match source.journal_of(doi) {
            Ok(journal) => {
                if cache.insert_new(doi, journal) {
                    stats.added += 1;
                }
            }
            Err(e) => {
                log::warn!("skipping {doi}: {e}");
                stats.failed += 1;
            }
        }
        progress.inc();
    }
    progress.finish();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprint::Preprint;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::{cell::RefCell, collections::HashMap};

    /// In-memory journal source that records which DOIs were asked for.
    struct Fixed {
        known: HashMap<&'static str, &'static str>,
        asked: RefCell<Vec<String>>,
    }

    impl Fixed {
        fn new(known: &[(&'static str, &'static str)]) -> Self {
            Fixed {
                known: known.iter().copied().collect(),
                asked: RefCell::default(),
            }
        }
    }

    impl JournalSource for Fixed {
        fn journal_of(&self, doi: &str) -> Result<String, LookupError> {
            self.asked.borrow_mut().push(doi.to_string());
            self.known
                .get(doi)
                .map(|j| j.to_string())
                .ok_or_else(|| LookupError::MissingContainerTitle(doi.to_string()))
        }
    }

    fn snapshot(vors: &[Option<&str>]) -> Snapshot {
        vors.iter()
            .enumerate()
            .map(|(i, vor)| {
                serde_json::from_value::<Preprint>(json!({
                    "id": format!("p{i}"),
                    "vor": vor.map(|d| json!({ "vorDoi": d })),
                }))
                .unwrap()
            })
            .collect()
    }

    const SICI: &str = "10.1002/(SICI)1521-3773(19980420)37:7<868::AID-ANIE868>3.0.CO;2-9";

    #[test]
    fn doi_parse_accepts_common_spellings() {
        for s in [
            "10.1021/jacs.4c00001",
            "doi: 10.1021/jacs.4c00001",
            "https://doi.org/10.1021/jacs.4c00001",
            "http://dx.doi.org/10.1021/jacs.4c00001",
        ] {
            let doi = Doi::parse(s).unwrap_or_else(|| panic!("{s}"));
            assert_eq!(doi.prefix, "10.1021");
            assert_eq!(doi.suffix, "jacs.4c00001");
        }
        assert!(Doi::parse("not a doi").is_none());
        assert!(Doi::parse("10.1021/").is_none());
        assert!(Doi::parse("11.1021/jacs").is_none());
    }

    #[test]
    fn doi_suffix_is_kept_whole() {
        let doi = Doi::parse(SICI).unwrap();
        assert_eq!(doi.prefix, "10.1002");
        assert_eq!(doi.suffix, "(SICI)1521-3773(19980420)37:7<868::AID-ANIE868>3.0.CO;2-9");
        assert_eq!(
            Doi::parse("10.1000/a[1]+b").unwrap().suffix,
            "a[1]+b"
        );
    }

    #[test]
    fn works_path_keeps_slashes_and_encodes_reserved_characters() {
        let doi = Doi {
            prefix: "10.1002",
            suffix: "anie.2024/x y",
        };
        assert_eq!(doi.works_path(), "works/10.1002/anie.2024/x%20y");
        assert_eq!(
            Doi::parse(SICI).unwrap().works_path(),
            "works/10.1002/(SICI)1521-3773(19980420)37:7%3C868::AID-ANIE868%3E3.0.CO;2-9"
        );
        assert_eq!(
            Doi::parse("10.1000/a[1]%b").unwrap().works_path(),
            "works/10.1000/a%5B1%5D%25b"
        );
    }

    #[test]
    fn only_unknown_dois_are_looked_up() {
        let snap = snapshot(&[Some("10.1/known"), Some("10.1/new"), None, Some("10.1/new")]);
        let mut cache = JournalCache::from([("10.1/known", "Old Journal")]);
        let source = Fixed::new(&[("10.1/known", "Renamed"), ("10.1/new", "New Journal")]);

        let stats = enrich(&snap, &mut cache, &source);
        assert_eq!(*source.asked.borrow(), ["10.1/new"]);
        assert_eq!(stats, EnrichStats { pending: 1, added: 1, failed: 0 });
        assert_eq!(cache.get("10.1/known"), Some("Old Journal"));
        assert_eq!(cache.get("10.1/new"), Some("New Journal"));
    }

    #[test]
    fn failures_are_skipped_and_retried_next_run() {
        let snap = snapshot(&[Some("10.1/a"), Some("10.1/b")]);
        let mut cache = JournalCache::default();

        let stats = enrich(&snap, &mut cache, &Fixed::new(&[("10.1/a", "A")]));
        assert_eq!(stats, EnrichStats { pending: 2, added: 1, failed: 1 });
        assert!(!cache.contains("10.1/b"));

        let retry = Fixed::new(&[("10.1/b", "B")]);
        let stats = enrich(&snap, &mut cache, &retry);
        assert_eq!(*retry.asked.borrow(), ["10.1/b"]);
        assert_eq!(stats.added, 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn enrichment_never_removes_or_overwrites() {
        proptest::proptest!(|(
            existing in proptest::collection::btree_map("10\\.1/[a-d]", "[A-Z]{3}", 0..4),
            vors in proptest::collection::vec("10\\.1/[a-f]", 0..8),
        )| {
            let entries: Vec<(&str, &str)> =
                existing.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            let mut cache = JournalCache::default();
            for (k, v) in &entries {
                cache.insert_new(k, v.to_string());
            }
            let vors: Vec<Option<&str>> = vors.iter().map(|d| Some(d.as_str())).collect();
            let source = Fixed::new(&[
                ("10.1/a", "X"), ("10.1/b", "X"), ("10.1/c", "X"),
                ("10.1/d", "X"), ("10.1/e", "X"),
            ]);
            enrich(&snapshot(&vors), &mut cache, &source);
            for (k, v) in &entries {
                proptest::prop_assert_eq!(cache.get(k), Some(*v));
            }
            proptest::prop_assert!(cache.len() >= entries.len());
        })
    }

    #[test]
    fn crossref_reads_container_title() {
        let mut server = Server::new();
        server
            .mock("GET", "/works/10.1021/jacs.4c00001")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "status": "ok",
                    "message": { "DOI": "10.1021/jacs.4c00001",
                                 "container-title": ["Journal of the American Chemical Society"] }
                })
                .to_string(),
            )
            .create();
        server
            .mock("GET", "/works/10.1021/gone")
            .match_query(Matcher::Any)
            .with_status(404)
            .create();
        server
            .mock("GET", "/works/10.1021/untitled")
            .match_query(Matcher::Any)
            .with_body(json!({ "message": { "container-title": [] } }).to_string())
            .create();

        let crossref = Crossref::new(&server.url()).unwrap();
        assert_eq!(
            crossref.journal_of("10.1021/jacs.4c00001").unwrap(),
            "Journal of the American Chemical Society"
        );
        assert!(matches!(
            crossref.journal_of("10.1021/gone"),
            Err(LookupError::Status { status: 404, .. })
        ));
        assert!(matches!(
            crossref.journal_of("10.1021/untitled"),
            Err(LookupError::MissingContainerTitle(_))
        ));
        assert!(matches!(
            crossref.journal_of("nonsense"),
            Err(LookupError::InvalidDoi(_))
        ));
    }

    #[test]
    fn crossref_is_asked_about_the_whole_doi() {
        // Angle brackets may reach the server raw or percent-encoded.
        const SICI_PATH: &str = concat!(
            r"^/works/10\.1002/\(SICI\)1521-3773\(19980420\)37:7",
            r"(%3C|<)868::AID-ANIE868(%3E|>)3\.0\.CO;2-9$",
        );

        let mut server = Server::new();
        let work = server
            .mock("GET", Matcher::Regex(SICI_PATH.into()))
            .match_query(Matcher::Any)
            .with_body(
                json!({ "message": { "container-title": ["Angewandte Chemie"] } }).to_string(),
            )
            .expect(1)
            .create();

        let crossref = Crossref::new(&server.url()).unwrap();
        assert_eq!(crossref.journal_of(SICI).unwrap(), "Angewandte Chemie");
        work.assert();

        let snap = snapshot(&[Some(SICI)]);
        let mut cache = JournalCache::default();
        let stats = enrich(&snap, &mut cache, &crossref);
        assert_eq!(stats.added, 1);
        assert!(cache.contains(SICI));
    }
}
