use std::fs;
use std::path::Path;

use chrono::{Days, NaiveDateTime};
use serde::Serialize;

use crate::artifact::{self, ArtifactLocation, ArtifactRecord};
use crate::errors::StoreError;
use crate::store::RemoteStore;

/// Limits on how many artifacts survive a retention pass.
///
/// `max_count` is at least 1 (a zero is rejected at configuration
/// load). `max_age_days == 0` disables age-based eviction. An artifact
/// is evicted when it violates *either* limit: the evicted set is the
/// union of the two violating sets, not the intersection.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub max_count: usize,
    pub max_age_days: u32,
}

/// Outcome of planning one retention pass.
#[derive(Debug, Default)]
pub struct EvictionPlan {
    pub keep: Vec<ArtifactRecord>,
    pub evict: Vec<ArtifactRecord>,
}

/// A deletion that could not be carried out.
#[derive(Debug, Clone, Serialize)]
pub struct EvictionFailure {
    pub name: String,
    pub reason: String,
}

/// What one retention pass actually did.
#[derive(Debug, Default, Clone, Serialize)]
pub struct EvictionReport {
    pub evicted: Vec<String>,
    pub failures: Vec<EvictionFailure>,
}

/// Decides which artifacts a pass keeps and which it deletes.
///
/// Artifacts are ranked newest-first by the timestamp embedded in their
/// name, ties broken by full-name order so plans are deterministic. The
/// newest `max_count` are exempt from count eviction; anything older
/// than the age cutoff is evicted regardless of rank. Zero-length
/// artifacts are leftovers of an interrupted run and are evicted
/// unconditionally.
pub fn plan_eviction(
    mut artifacts: Vec<ArtifactRecord>,
    policy: &RetentionPolicy,
    now: NaiveDateTime,
) -> EvictionPlan {
    artifacts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.name.cmp(&b.name))
    });

    let age_cutoff = (policy.max_age_days > 0)
        .then(|| now.checked_sub_days(Days::new(u64::from(policy.max_age_days))))
        .flatten();

    let mut plan = EvictionPlan::default();
    for (rank, record) in artifacts.into_iter().enumerate() {
        let beyond_count = rank >= policy.max_count;
        let over_age = age_cutoff.is_some_and(|cutoff| record.created_at < cutoff);
        let empty = record.size == 0;

        if beyond_count || over_age || empty {
            plan.evict.push(record);
        } else {
            plan.keep.push(record);
        }
    }
    plan
}

/// Deletes every artifact in `evict`, one at a time.
///
/// A failed deletion is recorded and the batch continues: retention is
/// a best-effort hygiene pass and must never abort the run.
pub async fn apply_eviction(evict: Vec<ArtifactRecord>, store: &dyn RemoteStore) -> EvictionReport {
    let mut report = EvictionReport::default();
    for record in evict {
        let outcome = match &record.location {
            ArtifactLocation::Local(path) => fs::remove_file(path).map_err(|e| e.to_string()),
            ArtifactLocation::Remote { object_id } => {
                store.delete(object_id).await.map_err(|e| e.to_string())
            }
        };
        match outcome {
            Ok(()) => {
                log::info!(target: "retention", "Evicted {}", record.name);
                report.evicted.push(record.name);
            }
            Err(reason) => {
                log::warn!(target: "retention", "Could not evict {}: {reason}", record.name);
                report.failures.push(EvictionFailure {
                    name: record.name,
                    reason,
                });
            }
        }
    }
    report
}

/// Runs one full retention pass over `artifacts`.
pub async fn run_pass(
    artifacts: Vec<ArtifactRecord>,
    policy: &RetentionPolicy,
    now: NaiveDateTime,
    store: &dyn RemoteStore,
) -> EvictionReport {
    let plan = plan_eviction(artifacts, policy, now);
    log::info!(target: "retention",
        "Keeping {} artifact(s), evicting {}",
        plan.keep.len(),
        plan.evict.len()
    );
    apply_eviction(plan.evict, store).await
}

/// Lists local artifacts of `database` in `dir`.
///
/// Stray `.sql` dumps are picked up alongside `.sql.gz` artifacts so an
/// interrupted run's leftovers stay under retention. Files that do not
/// parse as artifacts of this database are left alone.
pub fn collect_local_artifacts(
    dir: &Path,
    database: &str,
) -> std::io::Result<Vec<ArtifactRecord>> {
    let mut artifacts = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some((db, created_at)) = artifact::parse_artifact_name(name) else {
            continue;
        };
        if db != database {
            continue;
        }
        artifacts.push(ArtifactRecord {
            name: name.to_string(),
            location: ArtifactLocation::Local(entry.path()),
            size: entry.metadata()?.len(),
            created_at,
        });
    }
    Ok(artifacts)
}

/// Lists remote artifacts of `database` under `location_id`.
///
/// Unrelated objects sharing the location are filtered out and never
/// touched.
pub async fn collect_remote_artifacts(
    store: &dyn RemoteStore,
    location_id: &str,
    database: &str,
) -> Result<Vec<ArtifactRecord>, StoreError> {
    let objects = store.list(location_id).await?;
    Ok(objects
        .into_iter()
        .filter_map(|object| {
            let (db, created_at) = artifact::parse_artifact_name(&object.name)?;
            (db == database).then(|| ArtifactRecord {
                name: object.name,
                location: ArtifactLocation::Remote {
                    object_id: object.id,
                },
                size: object.size,
                created_at,
            })
        })
        .collect())
}
