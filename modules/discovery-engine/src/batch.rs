//! Sequential batch lookups with fixed pacing and per-item isolation.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use discovery_common::{BusinessQuery, DiscoveryResult, ProviderCredentials};
use futures::FutureExt;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::DiscoveryEngine;

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Clear both caches before the first item.
    pub clear_cache_first: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemOutcome {
    pub business_name: String,
    pub result: Option<DiscoveryResult>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl BatchItemOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub avg_per_business_ms: u64,
    pub items: Vec<BatchItemOutcome>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// One business at a time, in input order. The delay runs after every item
/// but the last regardless of how long the item took. A failing, stalled or
/// panicking item is recorded and the batch moves on.
pub async fn run(
    engine: &DiscoveryEngine,
    queries: Vec<BusinessQuery>,
    credentials: &ProviderCredentials,
    options: BatchOptions,
) -> BatchReport {
    let run_id = Uuid::new_v4();
    let total = queries.len();
    let delay = engine.config().effective_batch_delay();
    let item_timeout = engine.config().batch_item_timeout;
    let started = Instant::now();

    info!(%run_id, total, delay_ms = delay.as_millis() as u64, "Batch discovery starting");
    credentials.log_redacted();

    if options.clear_cache_first {
        engine.clear_caches().await;
    }

    let mut items = Vec::with_capacity(total);
    for (index, query) in queries.into_iter().enumerate() {
        let item_started = Instant::now();
        let lookup = AssertUnwindSafe(engine.discover(&query, credentials)).catch_unwind();

        let (result, error) = match tokio::time::timeout(item_timeout, lookup).await {
            Ok(Ok(Ok(result))) => (Some(result), None),
            Ok(Ok(Err(e))) => (None, Some(e.to_string())),
            Ok(Err(payload)) => (None, Some(format!("lookup panicked: {}", panic_message(payload.as_ref())))),
            Err(_) => (None, Some(format!("timed out after {}s", item_timeout.as_secs()))),
        };

        let duration_ms = item_started.elapsed().as_millis() as u64;
        match (&result, &error) {
            (Some(r), _) => info!(
                %run_id,
                item = index + 1,
                total,
                business = %query.name,
                found = r.found_count,
                duration_ms,
                "Batch item done"
            ),
            (None, Some(e)) => warn!(
                %run_id,
                item = index + 1,
                total,
                business = %query.name,
                error = %e,
                "Batch item failed"
            ),
            (None, None) => {}
        }

        items.push(BatchItemOutcome {
            business_name: query.name,
            result,
            error,
            duration_ms,
        });

        if index + 1 < total {
            tokio::time::sleep(delay).await;
        }
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    let processed = items.iter().filter(|i| i.is_ok()).count();
    let report = BatchReport {
        run_id,
        total,
        processed,
        failed: total - processed,
        duration_ms,
        avg_per_business_ms: if total == 0 { 0 } else { duration_ms / total as u64 },
        items,
    };

    info!(
        %run_id,
        total = report.total,
        processed = report.processed,
        failed = report.failed,
        duration_ms = report.duration_ms,
        "Batch discovery complete"
    );
    report
}
