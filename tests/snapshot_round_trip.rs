mod common;

use common::{ai_skirmish, quiet_config, run_ticks};
use warband_arena::{ArenaConfig, SnapshotError, standard_world};

#[test]
fn same_seed_same_match() {
    let mut a = ai_skirmish(ArenaConfig::default(), 5, 3);
    let mut b = ai_skirmish(ArenaConfig::default(), 5, 3);
    run_ticks(&mut a, 900);
    run_ticks(&mut b, 900);
    assert_eq!(a.serialize().unwrap(), b.serialize().unwrap());
}

#[test]
fn reloaded_world_resimulates_identically() {
    let mut original = ai_skirmish(ArenaConfig::default(), 13, 4);
    run_ticks(&mut original, 600);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mid_match.json");
    original.save_to_path(&path).unwrap();

    // A fresh world with different seed and opening shards; the file wins.
    let mut copy = standard_world(ArenaConfig::default(), 999);
    copy.load_from_path(&path).unwrap();
    assert_eq!(copy.tick(), original.tick());
    assert_eq!(copy.serialize().unwrap(), original.serialize().unwrap());

    run_ticks(&mut original, 600);
    run_ticks(&mut copy, 600);
    assert_eq!(copy.serialize().unwrap(), original.serialize().unwrap());
    assert_eq!(copy.render_view(), original.render_view());
}

#[test]
fn clock_settings_survive_the_trip() {
    let mut world = ai_skirmish(quiet_config(), 3, 2);
    world.set_time_scale(0.5);
    world.pause();
    let json = world.serialize().unwrap();

    let mut copy = standard_world(quiet_config(), 1);
    copy.deserialize(&json).unwrap();
    assert!(copy.is_paused());
    assert_eq!(copy.time_scale(), 0.5);
}

#[test]
fn unreadable_files_are_io_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut world = standard_world(quiet_config(), 1);
    let err = world.load_from_path(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, SnapshotError::Io(_)));
}

#[test]
fn future_versions_are_refused() {
    let world = ai_skirmish(quiet_config(), 3, 2);
    let mut doc: serde_json::Value = serde_json::from_str(&world.serialize().unwrap()).unwrap();
    doc["version"] = serde_json::json!(99);
    let mut copy = standard_world(quiet_config(), 1);
    let before = copy.serialize().unwrap();
    assert!(matches!(
        copy.deserialize(&doc.to_string()),
        Err(SnapshotError::UnsupportedVersion { found: 99, .. })
    ));
    assert_eq!(copy.serialize().unwrap(), before);
}

#[test]
fn exhausted_id_counter_is_refused() {
    let world = ai_skirmish(quiet_config(), 3, 2);
    let mut doc: serde_json::Value = serde_json::from_str(&world.serialize().unwrap()).unwrap();
    doc["next_entity_id"] = serde_json::json!(u64::MAX);
    let mut copy = standard_world(quiet_config(), 1);
    let before = copy.serialize().unwrap();
    assert!(matches!(
        copy.deserialize(&doc.to_string()),
        Err(SnapshotError::Inconsistent(_))
    ));
    assert_eq!(copy.serialize().unwrap(), before);
}

#[test]
fn far_ahead_id_counter_loads_and_keeps_counting() {
    let world = ai_skirmish(quiet_config(), 3, 2);
    let mut doc: serde_json::Value = serde_json::from_str(&world.serialize().unwrap()).unwrap();
    let far = 1u64 << 40;
    doc["next_entity_id"] = serde_json::json!(far);
    let mut copy = standard_world(quiet_config(), 1);
    copy.deserialize(&doc.to_string()).unwrap();
    assert_eq!(copy.create_entity(), far);
    run_ticks(&mut copy, 60);
}
