//! Download every preprint into an in-memory snapshot.

use crate::{
    api::{ApiError, Client},
    preprint::Preprint,
    progress::Progress,
    snapshot::Snapshot,
};

/// Listing endpoint enumerating all preprints.
pub const ITEMS: &str = "items";

/// Top-level fields that change on every fetch and are always dropped.
pub const ALWAYS_VOLATILE: &[&str] = &["metrics"];

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub page_size: usize,
    /// Top-level fields dropped from every record.
    pub volatile: Vec<String>,
}

impl IngestOptions {
    /// Options dropping [`ALWAYS_VOLATILE`] plus `extra`, without duplicates.
    pub fn new(page_size: usize, extra: Vec<String>) -> Self {
        let mut volatile: Vec<String> = ALWAYS_VOLATILE.iter().map(|f| f.to_string()).collect();
        for field in extra {
            if !volatile.contains(&field) {
                volatile.push(field);
            }
        }
        IngestOptions {
            page_size,
            volatile,
        }
    }
}

/// Walk the whole item listing. Any error aborts the walk and discards what was fetched.
pub fn download(client: &Client, options: &IngestOptions) -> Result<Snapshot, ApiError> {
    let total = client.total_count()?;
    log::info!("downloading list of preprints ({total})");

    let progress = Progress::new(total, "preprints");
    let mut snapshot = Snapshot::new();
    for (n, hit) in client.pages(ITEMS, options.page_size).enumerate() {
        let preprint = Preprint::from_hit(hit?, &options.volatile)
            .map_err(|reason| ApiError::malformed(client.endpoint(ITEMS), reason))?;
        if let Some(old) = snapshot.insert(preprint) {
            log::warn!("preprint {} listed twice; keeping the later copy", old.id);
        }
        progress.grow_to(n as u64 + 1);
        progress.inc();
    }
    progress.finish();

    if snapshot.len() as u64 != total {
        log::info!("server announced {total} preprints, received {}", snapshot.len());
    }
    Ok(snapshot)
}
