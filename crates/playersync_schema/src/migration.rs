//! # Schema Migration Engine
//!
//! A registry of directed `from -> to` transform steps between
//! [`SchemaVersion`]s. Migrating data between two versions uses a direct step
//! when one is registered and otherwise runs a breadth-first search over the
//! registered steps, then applies the resulting path in order.
//!
//! ## Concurrency
//!
//! Steps and computed paths live in [`DashMap`]s, so registration and
//! migration can be called from any number of threads through a shared
//! reference. No map guard is held while a user transform runs.
//!
//! ## Path cache
//!
//! Computed paths are cached per `(from, to)` pair. Registering any step
//! clears the whole cache. Each cache entry is stamped with the registry
//! generation it was computed against, so a path computed concurrently with a
//! registration is never served afterwards.

use crate::error::{MigrationError, Result};
use crate::version::SchemaVersion;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Boxed transform applied by a [`MigrationStep`].
pub type Transform<T> = dyn Fn(T) -> anyhow::Result<T> + Send + Sync;

type StepKey = (SchemaVersion, SchemaVersion);

/// A single registered transform from one schema version to a newer one.
pub struct MigrationStep<T> {
    from: SchemaVersion,
    to: SchemaVersion,
    transform: Box<Transform<T>>,
}

impl<T> MigrationStep<T> {
    pub fn from_version(&self) -> &SchemaVersion {
        &self.from
    }

    pub fn to_version(&self) -> &SchemaVersion {
        &self.to
    }

    /// Runs the transform, wrapping any failure with this step's versions.
    pub fn apply(&self, data: T) -> Result<T> {
        (self.transform)(data).map_err(|source| MigrationError::StepFailed {
            from: self.from.clone(),
            to: self.to.clone(),
            source,
        })
    }
}

impl<T> fmt::Debug for MigrationStep<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

type Path<T> = Arc<[Arc<MigrationStep<T>>]>;

struct CachedPath<T> {
    generation: u64,
    steps: Path<T>,
}

/// Version-aware migration registry for values of type `T`.
///
/// # Examples
///
/// ```rust
/// use playersync_schema::{SchemaMigration, SchemaVersion};
///
/// let migrations = SchemaMigration::<u32>::new();
/// let v1 = SchemaVersion::of(1, 0, 0);
/// let v2 = SchemaVersion::of(2, 0, 0);
/// let v3 = SchemaVersion::of(3, 0, 0);
///
/// migrations.register(v1.clone(), v2.clone(), |level| Ok(level + 1))?;
/// migrations.register(v2.clone(), v3.clone(), |level| Ok(level * 10))?;
///
/// assert_eq!(migrations.migrate(1, &v1, &v3)?, 20);
/// assert_eq!(migrations.migration_path(&v1, &v3), vec![v1, v2, v3]);
/// # Ok::<(), playersync_schema::MigrationError>(())
/// ```
pub struct SchemaMigration<T> {
    steps: DashMap<StepKey, Arc<MigrationStep<T>>>,
    path_cache: DashMap<StepKey, CachedPath<T>>,
    generation: AtomicU64,
}

impl<T> SchemaMigration<T> {
    pub fn new() -> Self {
        Self {
            steps: DashMap::new(),
            path_cache: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Registers a transform moving data from `from` to `to`.
    ///
    /// Registering the same `(from, to)` pair again replaces the earlier
    /// transform. Any registration invalidates every cached path.
    ///
    /// # Errors
    ///
    /// [`MigrationError::InvalidStep`] when `to` is not strictly newer than
    /// `from`.
    pub fn register<F>(&self, from: SchemaVersion, to: SchemaVersion, transform: F) -> Result<()>
    where
        F: Fn(T) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        if to <= from {
            return Err(MigrationError::InvalidStep { from, to });
        }

        let step = Arc::new(MigrationStep {
            from: from.clone(),
            to: to.clone(),
            transform: Box::new(transform),
        });

        if self.steps.insert((from.clone(), to.clone()), step).is_some() {
            warn!(%from, %to, "Replaced an existing migration step");
        } else {
            debug!(%from, %to, "Registered migration step");
        }

        self.generation.fetch_add(1, Ordering::AcqRel);
        self.path_cache.clear();
        Ok(())
    }

    /// Migrates `data` from `from` to `to`.
    ///
    /// Equal versions return the data untouched. Otherwise every step on the
    /// path is applied in order, each receiving the previous step's output.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::NoPath`] when no registered chain reaches `to`
    /// - [`MigrationError::StepFailed`] when a transform fails; nothing from
    ///   the partially applied path is returned
    pub fn migrate(&self, data: T, from: &SchemaVersion, to: &SchemaVersion) -> Result<T> {
        if from == to {
            return Ok(data);
        }

        let path = self.find_migration_path(from, to);
        if path.is_empty() {
            return Err(MigrationError::NoPath {
                from: from.clone(),
                to: to.clone(),
            });
        }

        debug!(%from, %to, steps = path.len(), "Applying migration path");
        path.iter().try_fold(data, |current, step| {
            trace!(from = %step.from, to = %step.to, "Applying migration step");
            step.apply(current)
        })
    }

    /// Like [`SchemaMigration::migrate`] but yields `None` on any failure.
    pub fn try_migrate(&self, data: T, from: &SchemaVersion, to: &SchemaVersion) -> Option<T> {
        match self.migrate(data, from, to) {
            Ok(migrated) => Some(migrated),
            Err(e) => {
                debug!("Migration from {} to {} abandoned: {}", from, to, e);
                None
            }
        }
    }

    /// Returns `true` if data at `from` can be brought to `to`.
    pub fn can_migrate(&self, from: &SchemaVersion, to: &SchemaVersion) -> bool {
        from == to || !self.find_migration_path(from, to).is_empty()
    }

    /// The ordered versions visited when migrating, including both ends.
    ///
    /// `[from]` when the versions are equal, empty when `to` is unreachable.
    pub fn migration_path(&self, from: &SchemaVersion, to: &SchemaVersion) -> Vec<SchemaVersion> {
        if from == to {
            return vec![from.clone()];
        }

        let path = self.find_migration_path(from, to);
        if path.is_empty() {
            return Vec::new();
        }

        std::iter::once(from.clone())
            .chain(path.iter().map(|step| step.to.clone()))
            .collect()
    }

    /// The highest version reachable from `from` by following registered
    /// steps, or `from` itself when it has no outgoing steps.
    ///
    /// Each reachable version is visited once.
    pub fn latest_migratable_version(&self, from: &SchemaVersion) -> SchemaVersion {
        let mut outgoing: HashMap<SchemaVersion, Vec<SchemaVersion>> = HashMap::new();
        for entry in self.steps.iter() {
            let (source, target) = entry.key();
            outgoing.entry(source.clone()).or_default().push(target.clone());
        }

        let mut visited = HashSet::from([from.clone()]);
        let mut pending = vec![from.clone()];
        let mut latest = from.clone();

        while let Some(current) = pending.pop() {
            for next in outgoing.get(&current).into_iter().flatten() {
                if visited.insert(next.clone()) {
                    latest = latest.max(next.clone());
                    pending.push(next.clone());
                }
            }
        }
        latest
    }

    pub fn contains_step(&self, from: &SchemaVersion, to: &SchemaVersion) -> bool {
        self.steps.contains_key(&(from.clone(), to.clone()))
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the steps leading from `from` to `to`, empty if unreachable.
    fn find_migration_path(&self, from: &SchemaVersion, to: &SchemaVersion) -> Path<T> {
        let generation = self.generation.load(Ordering::Acquire);
        let key = (from.clone(), to.clone());

        if let Some(cached) = self.path_cache.get(&key) {
            if cached.generation == generation {
                return cached.steps.clone();
            }
        }

        let steps: Path<T> = self.compute_path(from, to).into();
        if !steps.is_empty() {
            debug!(%from, %to, steps = steps.len(), "Computed migration path");
            self.path_cache.insert(
                key,
                CachedPath {
                    generation,
                    steps: steps.clone(),
                },
            );
        }
        steps
    }

    fn compute_path(&self, from: &SchemaVersion, to: &SchemaVersion) -> Vec<Arc<MigrationStep<T>>> {
        if let Some(direct) = self.steps.get(&(from.clone(), to.clone())) {
            return vec![direct.value().clone()];
        }

        // Snapshot the graph so no shard lock is held during the search.
        let mut outgoing: HashMap<SchemaVersion, Vec<Arc<MigrationStep<T>>>> = HashMap::new();
        for entry in self.steps.iter() {
            outgoing
                .entry(entry.key().0.clone())
                .or_default()
                .push(entry.value().clone());
        }
        for edges in outgoing.values_mut() {
            edges.sort_by(|a, b| a.to.cmp(&b.to));
        }

        let mut reached_by: HashMap<SchemaVersion, Arc<MigrationStep<T>>> = HashMap::new();
        let mut queue = VecDeque::from([from.clone()]);

        'search: while let Some(current) = queue.pop_front() {
            let Some(edges) = outgoing.get(&current) else {
                continue;
            };
            for step in edges {
                if reached_by.contains_key(&step.to) {
                    continue;
                }
                reached_by.insert(step.to.clone(), step.clone());
                if step.to == *to {
                    break 'search;
                }
                queue.push_back(step.to.clone());
            }
        }

        let mut path = Vec::new();
        let mut cursor = to;
        while cursor != from {
            let Some(step) = reached_by.get(cursor) else {
                return Vec::new();
            };
            path.push(step.clone());
            cursor = &step.from;
        }
        path.reverse();
        path
    }
}

impl<T> Default for SchemaMigration<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SchemaMigration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaMigration")
            .field("steps", &self.steps.len())
            .field("cached_paths", &self.path_cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn v(major: u32) -> SchemaVersion {
        SchemaVersion::of(major, 0, 0)
    }

    #[test]
    fn test_register_rejects_backward_and_noop_steps() {
        let migrations = SchemaMigration::<i32>::new();

        let backward = migrations.register(v(2), v(1), Ok);
        assert!(matches!(backward, Err(MigrationError::InvalidStep { .. })));

        let noop = migrations.register(v(2), v(2), Ok);
        assert!(matches!(noop, Err(MigrationError::InvalidStep { .. })));

        assert!(migrations.is_empty());
    }

    #[test]
    fn test_identity_migration_skips_registry() {
        let migrations = SchemaMigration::<i32>::new();
        assert_eq!(migrations.migrate(7, &v(3), &v(3)).unwrap(), 7);
        assert!(migrations.can_migrate(&v(3), &v(3)));
        assert_eq!(migrations.migration_path(&v(3), &v(3)), vec![v(3)]);
    }

    #[test]
    fn test_chained_path_applies_in_order() {
        let migrations = SchemaMigration::<Vec<u32>>::new();
        for major in 1..4 {
            migrations
                .register(v(major), v(major + 1), move |mut trail| {
                    trail.push(major);
                    Ok(trail)
                })
                .unwrap();
        }

        let migrated = migrations.migrate(Vec::new(), &v(1), &v(4)).unwrap();
        assert_eq!(migrated, vec![1, 2, 3]);
        assert_eq!(migrations.migration_path(&v(1), &v(4)), vec![v(1), v(2), v(3), v(4)]);
    }

    #[test]
    fn test_unreachable_target_reports_no_path() {
        let migrations = SchemaMigration::<i32>::new();
        migrations.register(v(1), v(2), Ok).unwrap();

        assert!(!migrations.can_migrate(&v(1), &v(5)));
        assert!(migrations.migration_path(&v(1), &v(5)).is_empty());

        match migrations.migrate(1, &v(1), &v(5)) {
            Err(MigrationError::NoPath { from, to }) => {
                assert_eq!(from, v(1));
                assert_eq!(to, v(5));
            }
            other => panic!("expected NoPath, got {other:?}"),
        }
        assert_eq!(migrations.try_migrate(1, &v(1), &v(5)), None);
    }

    #[test]
    fn test_downgrade_is_never_reachable() {
        let migrations = SchemaMigration::<i32>::new();
        migrations.register(v(1), v(2), Ok).unwrap();
        assert!(!migrations.can_migrate(&v(2), &v(1)));
    }

    #[test]
    fn test_direct_step_preferred_over_chain() {
        let migrations = SchemaMigration::<u32>::new();
        let invocations = Arc::new(AtomicUsize::new(0));

        for (from, to) in [(1, 2), (2, 3), (3, 4), (1, 4)] {
            let invocations = invocations.clone();
            migrations
                .register(v(from), v(to), move |value| {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok(value + 1)
                })
                .unwrap();
        }

        assert_eq!(migrations.migrate(0, &v(1), &v(4)).unwrap(), 1);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(migrations.migration_path(&v(1), &v(4)), vec![v(1), v(4)]);
    }

    #[test]
    fn test_bfs_finds_shortest_chain() {
        let migrations = SchemaMigration::<u32>::new();
        // 1 -> 2 -> 3 -> 4 -> 5 and a shortcut 2 -> 4
        for (from, to) in [(1, 2), (2, 3), (3, 4), (4, 5), (2, 4)] {
            migrations.register(v(from), v(to), Ok).unwrap();
        }

        assert_eq!(
            migrations.migration_path(&v(1), &v(5)),
            vec![v(1), v(2), v(4), v(5)]
        );
    }

    #[test]
    fn test_failing_step_is_identified() {
        let migrations = SchemaMigration::<u32>::new();
        migrations.register(v(1), v(2), |value| Ok(value + 1)).unwrap();
        migrations
            .register(v(2), v(3), |_| Err(anyhow::anyhow!("tier table missing")))
            .unwrap();

        let error = migrations.migrate(0, &v(1), &v(3)).unwrap_err();
        assert_eq!(error.versions(), (&v(2), &v(3)));
        assert!(error.to_string().contains("tier table missing"));
        assert!(matches!(error, MigrationError::StepFailed { .. }));
        assert_eq!(migrations.try_migrate(0, &v(1), &v(3)), None);
    }

    #[test]
    fn test_registration_invalidates_cached_paths() {
        let migrations = SchemaMigration::<u32>::new();
        migrations.register(v(1), v(2), |n| Ok(n + 1)).unwrap();
        migrations.register(v(2), v(3), |n| Ok(n + 1)).unwrap();

        assert_eq!(migrations.migration_path(&v(1), &v(3)).len(), 3);

        // A direct step registered later must win over the cached chain.
        migrations.register(v(1), v(3), |n| Ok(n + 100)).unwrap();
        assert_eq!(migrations.migration_path(&v(1), &v(3)), vec![v(1), v(3)]);
        assert_eq!(migrations.migrate(0, &v(1), &v(3)).unwrap(), 100);
    }

    #[test]
    fn test_duplicate_registration_overwrites_silently() {
        let migrations = SchemaMigration::<u32>::new();
        migrations.register(v(1), v(2), |n| Ok(n + 1)).unwrap();
        migrations.register(v(1), v(2), |n| Ok(n + 2)).unwrap();

        assert_eq!(migrations.step_count(), 1);
        assert_eq!(migrations.migrate(0, &v(1), &v(2)).unwrap(), 2);
    }

    #[test]
    fn test_latest_migratable_version_follows_forward_edges() {
        let migrations = SchemaMigration::<u32>::new();
        migrations.register(v(1), v(2), Ok).unwrap();
        migrations.register(v(2), v(3), Ok).unwrap();
        migrations.register(v(1), SchemaVersion::of(1, 5, 0), Ok).unwrap();
        migrations.register(v(10), v(11), Ok).unwrap();

        assert_eq!(migrations.latest_migratable_version(&v(1)), v(3));
        assert_eq!(migrations.latest_migratable_version(&v(3)), v(3));
        assert_eq!(migrations.latest_migratable_version(&v(10)), v(11));
        assert_eq!(migrations.latest_migratable_version(&v(7)), v(7));
    }

    #[test]
    fn test_latest_migratable_version_on_dense_graph() {
        let migrations = SchemaMigration::<u32>::new();
        for from in 0..24 {
            for to in (from + 1)..=24 {
                migrations.register(v(from), v(to), Ok).unwrap();
            }
        }
        assert_eq!(migrations.step_count(), 300);

        let started = std::time::Instant::now();
        assert_eq!(migrations.latest_migratable_version(&v(0)), v(24));
        assert_eq!(migrations.latest_migratable_version(&v(12)), v(24));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_pre_release_versions_are_nodes() {
        let migrations = SchemaMigration::<u32>::new();
        let beta = SchemaVersion::of(2, 0, 0).with_pre_release("beta");

        migrations.register(v(1), beta.clone(), |n| Ok(n + 1)).unwrap();
        migrations.register(beta.clone(), v(2), |n| Ok(n * 3)).unwrap();

        assert_eq!(migrations.migrate(1, &v(1), &v(2)).unwrap(), 6);
        assert_eq!(migrations.migration_path(&v(1), &v(2)), vec![v(1), beta, v(2)]);
    }
}
