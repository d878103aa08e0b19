use serde_json::Value;

use super::{ApiError, Client};

/// Key under which listing endpoints return their hits.
const HITS_KEY: &str = "itemHits";

/// What a single listing request returned.
#[derive(Debug, PartialEq)]
enum Page {
    Hits(Vec<Value>),
    /// The endpoint answered with one object instead of a list.
    Single(Value),
}

fn classify(body: Value) -> Result<Page, String> {
    match body {
        Value::Array(hits) => Ok(Page::Hits(hits)),
        Value::Object(mut map) => match map.remove(HITS_KEY) {
            Some(Value::Array(hits)) => Ok(Page::Hits(hits)),
            Some(other) => Err(format!("`{HITS_KEY}` is not a list: {other}")),
            None => Ok(Page::Single(Value::Object(map))),
        },
        other => Err(format!("expected a list or an object, got {other}")),
    }
}

/// Lazy iterator over every hit of a paginated listing.
///
/// Pages are requested with `limit`/`skip` until one comes back empty or a non-list response is
/// seen. The first error is yielded once, after which the iterator is exhausted.
pub struct Pages<'a> {
    client: &'a Client,
    path: String,
    page_size: usize,
    page: usize,
    buffer: std::vec::IntoIter<Value>,
    done: bool,
}

impl<'a> Pages<'a> {
    pub(super) fn new(client: &'a Client, path: &str, page_size: usize) -> Self {
        Pages {
            client,
            path: path.to_string(),
            page_size: page_size.max(1),
            page: 0,
            buffer: Vec::new().into_iter(),
            done: false,
        }
    }

    /// Rewind to the first page; the next item comes from a fresh request for page zero.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn restart(&mut self) {
        self.page = 0;
        self.buffer = Vec::new().into_iter();
        self.done = false;
    }

    fn fetch(&self) -> Result<Page, ApiError> {
        let params = [
            ("limit", self.page_size.to_string()),
            ("skip", (self.page * self.page_size).to_string()),
        ];
        let body = self.client.get(&self.path, &params)?;
        classify(body)
            .map_err(|reason| ApiError::malformed(self.client.endpoint(&self.path), reason))
    }
}

impl Iterator for Pages<'_> {
    type Item = Result<Value, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(hit) = self.buffer.next() {
                return Some(Ok(hit));
            }
            if self.done {
                return None;
            }
            match self.fetch() {
                Ok(Page::Hits(hits)) if hits.is_empty() => {
                    self.done = true;
                    return None;
                }
                Ok(Page::Hits(hits)) => {
                    log::debug!("page {} of {}: {} hits", self.page, self.path, hits.len());
                    self.page += 1;
                    self.buffer = hits.into_iter();
                }
                Ok(Page::Single(item)) => {
                    self.done = true;
                    return Some(Ok(item));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl std::iter::FusedIterator for Pages<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, parse_base_url};
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use serde_json::json;

    fn client(server: &Server) -> Client {
        Client::new(&ApiConfig {
            base_url: parse_base_url(&server.url()).unwrap(),
            token: None,
            check_path: "items".into(),
        })
        .unwrap()
    }

    fn page(server: &mut ServerGuard, skip: usize, body: Value) -> Mock {
        server
            .mock("GET", "/items")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "2".into()),
                Matcher::UrlEncoded("skip".into(), skip.to_string()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create()
    }

    fn hit(id: &str) -> Value {
        json!({ "item": { "id": id } })
    }

    #[test]
    fn classify_accepts_bare_lists_and_hit_objects() {
        assert_eq!(classify(json!([1, 2])).unwrap(), Page::Hits(vec![json!(1), json!(2)]));
        assert_eq!(
            classify(json!({ "totalCount": 3, "itemHits": [] })).unwrap(),
            Page::Hits(vec![])
        );
        assert_eq!(
            classify(json!({ "id": "x" })).unwrap(),
            Page::Single(json!({ "id": "x" }))
        );
        assert!(classify(json!({ "itemHits": 3 })).is_err());
        assert!(classify(json!("text")).is_err());
    }

    #[test]
    fn walks_pages_until_empty() {
        let mut server = Server::new();
        let p0 = page(&mut server, 0, json!({ "itemHits": [hit("a"), hit("b")] }));
        let p1 = page(&mut server, 2, json!({ "itemHits": [hit("c")] }));
        let p2 = page(&mut server, 4, json!({ "itemHits": [] }));

        let client = client(&server);
        let ids: Vec<String> = client
            .pages("items", 2)
            .map(|hit| hit.unwrap()["item"]["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
        p0.assert();
        p1.assert();
        p2.assert();
    }

    #[test]
    fn single_object_response_ends_iteration() {
        let mut server = Server::new();
        page(&mut server, 0, json!({ "id": "only" }));
        let client = client(&server);
        let items: Vec<Value> = client.pages("items", 2).map(Result::unwrap).collect();
        assert_eq!(items, vec![json!({ "id": "only" })]);
    }

    #[test]
    fn http_error_is_yielded_once_then_fused() {
        let mut server = Server::new();
        page(&mut server, 0, json!([hit("a"), hit("b")]));
        server
            .mock("GET", "/items")
            .match_query(Matcher::UrlEncoded("skip".into(), "2".into()))
            .with_status(503)
            .create();

        let client = client(&server);
        let mut pages = client.pages("items", 2);
        assert!(pages.next().unwrap().is_ok());
        assert!(pages.next().unwrap().is_ok());
        let err = pages.next().unwrap().unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 503, .. }), "{err:?}");
        assert!(pages.next().is_none());
    }

    #[test]
    fn restart_begins_again_from_page_zero() {
        let mut server = Server::new();
        let p0 = server
            .mock("GET", "/items")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "2".into()),
                Matcher::UrlEncoded("skip".into(), "0".into()),
            ]))
            .with_body(json!([hit("a")]).to_string())
            .expect(2)
            .create();
        page(&mut server, 2, json!([]));

        let client = client(&server);
        let mut pages = client.pages("items", 2);
        assert_eq!(pages.by_ref().count(), 1);
        pages.restart();
        assert_eq!(pages.count(), 1);
        p0.assert();
    }
}
