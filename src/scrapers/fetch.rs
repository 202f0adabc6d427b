//! Rate-limited article fetching.

use crate::http::PageFetcher;
use crate::models::{Scrap, Source};
use crate::rate_limiter::{Clock, RateLimiter};
use futures::stream::{self, StreamExt};
use tracing::{error, info, instrument};

/// Fetch every source in order, one request at a time.
///
/// Sources whose request fails (network error, non-2xx status) are logged and
/// left out of the result; the batch itself never fails.
///
/// # Arguments
///
/// * `fetcher` - Client used for every request
/// * `limiter` - The site's rate limiter, shared with discovery
/// * `sources` - Sources in discovery order
///
/// # Returns
///
/// One [`Scrap`] per successfully fetched source, in input order.
#[instrument(level = "info", skip_all, fields(count = sources.len()))]
pub async fn fetch_all<F, C>(fetcher: &F, limiter: &RateLimiter<C>, sources: Vec<Source>) -> Vec<Scrap>
where
    F: PageFetcher,
    C: Clock,
{
    let total = sources.len();
    let scraps: Vec<Scrap> = stream::iter(sources.into_iter().enumerate())
        .then(move |(i, source)| async move {
            let outcome = limiter.limited(fetcher.get_text(&source.path)).await;
            if (i + 1) % 100 == 0 {
                info!(fetched = i + 1, total, "Fetch progress");
            }
            match outcome {
                Ok(raw_content) => Some(Scrap {
                    source,
                    raw_content,
                }),
                Err(e) => {
                    error!(url = %source.path, error = %e, "Could not fetch scrap");
                    None
                }
            }
        })
        .filter_map(std::future::ready)
        .collect()
        .await;

    info!(
        fetched = scraps.len(),
        failed = total - scraps.len(),
        "Fetched article contents"
    );
    scraps
}
