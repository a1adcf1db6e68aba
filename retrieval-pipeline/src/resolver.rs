//! Decides which documents are relevant to a free-text query.
//!
//! Resolution works on names and identifiers only; it never fetches file
//! content, so it stays cheap even against a large corpus.

use tracing::{debug, instrument, warn};

use common::{
    error::AppError,
    storage::{
        index::{normalize_name, ProvinceIndex, ProvinceIndexCache},
        store::DocumentStore,
        types::{candidate_file::CandidateFile, province::ProvinceFolder},
    },
};

use crate::scoring::pick_best_file;
use crate::triggers::is_broad_scope;

/// Filler words stripped from the query before the last-resort name search.
const FILLER_WORDS: &[&str] = &["ราคา", "ข้อมูล"];

/// Resolves a query to at most one candidate file per matched province
/// folder.
///
/// Priority: province-name containment, then trigger-word broad scope, then
/// literal folder-name containment; when all of that yields nothing, an
/// unconstrained name-contains search over the whole corpus.
///
/// Province matching is plain substring containment, not word-boundary
/// aware; short province names can false-positive inside unrelated words.
/// Known limitation, kept deliberately.
#[instrument(skip_all)]
pub async fn resolve_candidates(
    store: &DocumentStore,
    index_cache: &ProvinceIndexCache,
    query: &str,
) -> Result<Vec<CandidateFile>, AppError> {
    let index = index_cache.get_or_build(store).await?;

    let matched = match_provinces(&index, query);
    let folders: Vec<ProvinceFolder> = if !matched.is_empty() {
        debug!(provinces = matched.len(), "query names provinces directly");
        matched
    } else if is_broad_scope(query) {
        debug!("broad-scope trigger detected, scanning every province");
        index.folders().cloned().collect()
    } else {
        // Catches folder names absent from the canonical index form, e.g.
        // partially typed names that still match the raw folder string.
        index
            .folders()
            .filter(|folder| query.contains(folder.name.trim()))
            .cloned()
            .collect()
    };

    let mut candidates = Vec::new();
    for folder in &folders {
        match store.list_documents(folder).await {
            Ok(files) => {
                if let Some(best) = pick_best_file(&files, query, &folder.name) {
                    candidates.push(CandidateFile::from_meta(best, folder.name.clone()));
                }
            }
            // A transient listing failure degrades to "nothing from this
            // folder" rather than failing the request.
            Err(err) => {
                warn!(folder = %folder.name, error = %err, "folder listing failed, skipping");
            }
        }
    }

    if candidates.is_empty() {
        let needle = strip_filler(query);
        if !needle.is_empty() {
            match store.search_documents(&needle).await {
                Ok(found) => {
                    debug!(hits = found.len(), "name-contains fallback search");
                    candidates.extend(found.into_iter().map(|meta| {
                        let province = province_of(&meta.location);
                        CandidateFile::from_meta(meta, province)
                    }));
                }
                Err(err) => {
                    warn!(error = %err, "fallback search failed, returning no candidates");
                }
            }
        }
    }

    Ok(candidates)
}

/// Every indexed province whose normalized name occurs in the normalized
/// query. Multiple matches are expected for comparison queries.
fn match_provinces(index: &ProvinceIndex, query: &str) -> Vec<ProvinceFolder> {
    let query = normalize_name(query);
    index
        .entries()
        .filter(|(name, _)| query.contains(name.as_str()))
        .map(|(_, folder)| folder.clone())
        .collect()
}

fn strip_filler(query: &str) -> String {
    let mut cleaned = query.to_string();
    for filler in FILLER_WORDS {
        cleaned = cleaned.replace(filler, "");
    }
    cleaned.trim().to_string()
}

fn province_of(location: &str) -> String {
    location
        .split_once('/')
        .map_or(String::new(), |(province, _)| province.to_string())
}
