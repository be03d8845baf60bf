use actix_web::error::{ErrorBadRequest, ErrorServiceUnavailable};
use actix_web::web::{Data, Query};
use actix_web::{route, HttpResponse, Result as ActixResult};
use log::{debug, error};
use serde::Deserialize;
use serde_json::json;

use crate::search::fts::{self, SearchHit};
use crate::search::query::rewrite;
use crate::search::rank::{apply_distance_score, apply_tag_score, distance_km, Scorer};
use crate::srv::server::{map_internal_error, AppState};

/// Hard cap on rows pulled for ranking; the stock FTS5 order keeps the most
/// promising candidates when a query matches more.
const CANDIDATE_LIMIT: u32 = 1024;

const DEFAULT_LIMIT: u32 = 50;
const MAX_OFFSET: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
    /// `minLng,minLat,maxLng,maxLat`
    bounds: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
    sort: Option<String>,
    bounded: Option<String>,
    autocomplete: Option<String>,
    debug: Option<String>,
}

fn flag(value: &Option<String>) -> bool {
    value
        .as_deref()
        .is_some_and(|v| matches!(v, "1" | "true" | "yes"))
}

fn parse_bounds(value: &str) -> Option<(f64, f64, f64, f64)> {
    let parts: Vec<f64> = value.split(',').map_while(|p| p.trim().parse().ok()).collect();
    let [w, s, e, n] = parts.as_slice() else {
        return None;
    };
    Some((*w, *s, *e, *n))
}

#[route("/search", method = "GET")]
pub(crate) async fn get_search(
    params: Query<SearchParams>,
    state: Data<AppState>,
) -> ActixResult<HttpResponse> {
    let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
        return Err(ErrorBadRequest("missing query parameter q"));
    };
    let pool = match state.fts_pool().await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Cannot open search store: {e}");
            return Err(ErrorServiceUnavailable("search index unavailable"));
        }
    };

    let debug_mode = flag(&params.debug);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIMIT)
        .min(if debug_mode { u32::MAX } else { DEFAULT_LIMIT })
        as usize;
    let mut offset = params.offset.unwrap_or(0);
    if !debug_mode {
        offset = offset.min(MAX_OFFSET);
    }
    let offset = offset as usize;

    let bounds = match params.bounds.as_deref() {
        None => None,
        Some(raw) => Some(
            parse_bounds(raw).ok_or_else(|| ErrorBadRequest("bounds must be w,s,e,n"))?,
        ),
    };
    let bounded = flag(&params.bounded) && bounds.is_some();
    let sort_by_distance = params.sort.as_deref() == Some("dist") && bounds.is_some();

    let rewritten = rewrite(q, flag(&params.autocomplete));
    if rewritten.match_expr.is_empty() {
        return Ok(HttpResponse::Ok().json(json!({ "results": [] })));
    }
    debug!("Search '{q}' -> {}", rewritten.match_expr);

    let total_docs = fts::row_count(pool).await.map_err(map_internal_error)?;
    let mut doc_counts = Vec::with_capacity(rewritten.phrases.len());
    for phrase in &rewritten.phrases {
        let count = fts::phrase_doc_count(pool, &phrase.tokens.join(" "))
            .await
            .map_err(map_internal_error)?;
        doc_counts.push(count);
    }
    let scorer = Scorer::new(rewritten.phrases.clone(), &doc_counts, total_docs);

    let candidates = if bounded {
        let bounds = bounds.expect("bounded implies bounds");
        fts::matches_bounded(pool, &rewritten.match_expr, bounds, CANDIDATE_LIMIT).await
    } else {
        fts::matches(pool, &rewritten.match_expr, CANDIDATE_LIMIT).await
    }
    // FTS5 syntax errors surface here for raw categorical queries
    .map_err(|e| ErrorBadRequest(format!("unsupported query: {e}")))?;

    let center_radius = bounds.map(|(w, s, e, n)| {
        let center = ((w + e) / 2.0, (s + n) / 2.0);
        (center, distance_km((w, s), (e, n)) / 2.0)
    });

    let mut scored: Vec<(f64, SearchHit)> = candidates
        .into_iter()
        .map(|hit| {
            let rank = if sort_by_distance {
                let (center, _) = center_radius.expect("sort=dist implies bounds");
                distance_km(center, (hit.lng, hit.lat))
            } else {
                let mut rank =
                    scorer.score([&hit.name, &hit.name_en, &hit.admin, &hit.tags]);
                if !bounded {
                    rank = apply_tag_score(rank, &hit.tags);
                }
                if let Some((center, radius)) = center_radius {
                    if radius > 0.0 {
                        rank = apply_distance_score(
                            rank,
                            distance_km(center, (hit.lng, hit.lat)),
                        );
                    }
                }
                rank
            };
            (rank, hit)
        })
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));

    let results: Vec<serde_json::Value> = scored
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|(score, hit)| {
            let props: serde_json::Value =
                serde_json::from_str(&hit.props).unwrap_or(serde_json::Value::Null);
            json!({
                "lng": hit.lng,
                "lat": hit.lat,
                "score": score,
                "tags": hit.tags,
                "props": props,
            })
        })
        .collect();

    let mut body = json!({ "results": results });
    if debug_mode {
        let total = fts::count_matches(pool, &rewritten.match_expr)
            .await
            .map_err(map_internal_error)?;
        body["total"] = json!(total);
    }
    Ok(HttpResponse::Ok().json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounds() {
        assert_eq!(
            parse_bounds("-123.1,37.2,-121.5,38.0"),
            Some((-123.1, 37.2, -121.5, 38.0))
        );
        assert_eq!(parse_bounds("1,2,3"), None);
        assert_eq!(parse_bounds("a,b,c,d"), None);
    }

    #[test]
    fn test_flag_values() {
        assert!(flag(&Some("1".to_string())));
        assert!(flag(&Some("true".to_string())));
        assert!(!flag(&Some("0".to_string())));
        assert!(!flag(&None));
    }
}
