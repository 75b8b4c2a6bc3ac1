//! End-to-end migration scenarios over JSON documents.
//!
//! These mirror how profile documents evolve across plugin releases: fields
//! get added with defaults, renamed, and occasionally restructured.

use playersync_schema::{MigrationError, SchemaMigration, SchemaVersion};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn add_field(name: &'static str, default: Value) -> impl Fn(Value) -> anyhow::Result<Value> {
    move |mut document| {
        let object = document
            .as_object_mut()
            .ok_or_else(|| anyhow::anyhow!("document is not an object"))?;
        object.entry(name).or_insert_with(|| default.clone());
        Ok(document)
    }
}

fn rename_field(old: &'static str, new: &'static str) -> impl Fn(Value) -> anyhow::Result<Value> {
    move |mut document| {
        let object = document
            .as_object_mut()
            .ok_or_else(|| anyhow::anyhow!("document is not an object"))?;
        if let Some(value) = object.remove(old) {
            object.insert(new.to_string(), value);
        }
        Ok(document)
    }
}

type BoxedTransform = Box<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

fn version(text: &str) -> SchemaVersion {
    SchemaVersion::parse(text).expect("valid test version")
}

#[test]
fn test_add_then_rename_field() {
    init_tracing();
    let migrations = SchemaMigration::<Value>::new();
    migrations
        .register(version("1.0"), version("2.0"), add_field("level", json!(1)))
        .unwrap();
    migrations
        .register(version("2.0"), version("3.0"), rename_field("level", "tier"))
        .unwrap();

    let migrated = migrations
        .migrate(json!({ "name": "x" }), &version("1.0"), &version("3.0"))
        .unwrap();

    assert_eq!(migrated, json!({ "name": "x", "tier": 1 }));
}

#[test]
fn test_chained_migration_equals_manual_chaining() {
    init_tracing();
    let migrations = SchemaMigration::<Value>::new();
    let steps: Vec<(&str, &str, BoxedTransform)> = vec![
        ("1", "2", Box::new(add_field("coins", json!(0))) as BoxedTransform),
        ("2", "3", Box::new(rename_field("coins", "balance")) as BoxedTransform),
        ("3", "4", Box::new(add_field("locale", json!("en_us"))) as BoxedTransform),
    ];

    let mut manual = json!({ "uuid": "069a79f4-44e9-4726-a5be-fca90e38aaf5" });
    for (from, to, transform) in steps {
        manual = transform(manual).unwrap();
        let (from, to) = (version(from), version(to));
        let shared: Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync> = Arc::from(transform);
        migrations
            .register(from, to, move |document| shared(document))
            .unwrap();
    }

    let migrated = migrations
        .migrate(
            json!({ "uuid": "069a79f4-44e9-4726-a5be-fca90e38aaf5" }),
            &version("1"),
            &version("4"),
        )
        .unwrap();

    assert_eq!(migrated, manual);
    assert_eq!(
        migrations.migration_path(&version("1"), &version("4")),
        vec![version("1"), version("2"), version("3"), version("4")]
    );
    assert!(!migrations.can_migrate(&version("1"), &version("5")));
}

#[test]
fn test_failing_transform_names_the_step() {
    init_tracing();
    let migrations = SchemaMigration::<Value>::new();
    migrations
        .register(version("1.0"), version("1.1"), add_field("level", json!(1)))
        .unwrap();
    migrations
        .register(version("1.1"), version("2.0"), |_| {
            anyhow::bail!("inventory layout cannot be converted")
        })
        .unwrap();

    let error = migrations
        .migrate(json!({}), &version("1.0"), &version("2.0"))
        .unwrap_err();

    match &error {
        MigrationError::StepFailed { from, to, source } => {
            assert_eq!(from, &version("1.1"));
            assert_eq!(to, &version("2.0"));
            assert_eq!(source.to_string(), "inventory layout cannot be converted");
        }
        other => panic!("expected StepFailed, got {other:?}"),
    }
    assert!(std::error::Error::source(&error).is_some());
}

#[test]
fn test_non_object_document_fails_cleanly() {
    let migrations = SchemaMigration::<Value>::new();
    migrations
        .register(version("1"), version("2"), add_field("level", json!(1)))
        .unwrap();

    assert!(migrations.try_migrate(json!([1, 2, 3]), &version("1"), &version("2")).is_none());
}

#[test]
fn test_long_chain_latest_version_terminates() {
    // Every registered step moves strictly forward, so walking the graph from
    // any node always ends.
    let migrations = SchemaMigration::<u64>::new();
    for minor in 0..64 {
        migrations
            .register(SchemaVersion::of(1, minor, 0), SchemaVersion::of(1, minor + 1, 0), |n| {
                Ok(n + 1)
            })
            .unwrap();
    }

    assert_eq!(
        migrations.latest_migratable_version(&SchemaVersion::of(1, 0, 0)),
        SchemaVersion::of(1, 64, 0)
    );
    assert_eq!(
        migrations
            .migrate(0, &SchemaVersion::of(1, 0, 0), &SchemaVersion::of(1, 64, 0))
            .unwrap(),
        64
    );
}

#[test]
fn test_concurrent_registration_and_migration() {
    init_tracing();
    let migrations = SchemaMigration::<u64>::new();
    let applied = AtomicUsize::new(0);

    migrations
        .register(SchemaVersion::of(1, 0, 0), SchemaVersion::of(2, 0, 0), |n| Ok(n + 1))
        .unwrap();

    std::thread::scope(|scope| {
        for worker in 0..4u32 {
            let migrations = &migrations;
            scope.spawn(move || {
                for minor in 0..50u32 {
                    let from = SchemaVersion::of(10 + worker, minor, 0);
                    let to = SchemaVersion::of(10 + worker, minor + 1, 0);
                    migrations.register(from, to, |n| Ok(n * 2)).unwrap();
                }
            });
        }
        for _ in 0..4 {
            let migrations = &migrations;
            let applied = &applied;
            scope.spawn(move || {
                for _ in 0..200 {
                    let result = migrations
                        .migrate(1, &SchemaVersion::of(1, 0, 0), &SchemaVersion::of(2, 0, 0))
                        .unwrap();
                    assert_eq!(result, 2);
                    applied.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    assert_eq!(applied.load(Ordering::Relaxed), 800);
    assert_eq!(migrations.step_count(), 1 + 4 * 50);
    assert_eq!(
        migrations
            .migrate(1, &SchemaVersion::of(12, 0, 0), &SchemaVersion::of(12, 50, 0))
            .unwrap(),
        1u64 << 50
    );
}
