//! Tests for the key manager and rotation scheduler

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Weak};
use std::thread;

use chrono::Duration;

use super::*;
use crate::config::PqcConfig;
use crate::error::{error_codes, CryptoError};
use crate::hybrid::{decrypt_hybrid, encrypt_hybrid};
use crate::security_level::SecurityLevel;

fn phi_key(manager: &KeyManager, options: KeyGenerationOptions) -> StoredKey {
    manager
        .generate_encryption_key(KeyType::PhiEncryption, "records-service", SecurityLevel::Level3, options)
        .unwrap()
}

#[test]
fn test_generate_encryption_key() {
    let manager = KeyManager::new();
    let key = phi_key(
        &manager,
        KeyGenerationOptions::default()
            .with_expiry_days(90)
            .with_tag("department", "oncology"),
    );

    let metadata = &key.metadata;
    assert_eq!(metadata.status, KeyStatus::Active);
    assert_eq!(metadata.owner, "records-service");
    assert_eq!(metadata.usage_count, 0);
    assert!(metadata.key_id.starts_with("ML-KEM-768-"));
    assert_eq!(metadata.tags["department"], "oncology");
    assert!(metadata.tags.contains_key(types::TAG_FINGERPRINT));

    let expires_at = metadata.expires_at.unwrap();
    assert_eq!(expires_at - metadata.created_at, Duration::days(90));
    assert_eq!(metadata.rotate_at.unwrap(), expires_at - Duration::days(7));

    let key_pair = manager.get_key_pair(key.key_id()).unwrap();
    assert_eq!(key_pair.key_id, metadata.key_id);
    assert_eq!(key_pair.public_key, key.public_key);
}

#[test]
fn test_key_ids_are_unique() {
    let manager = KeyManager::new();
    let a = phi_key(&manager, KeyGenerationOptions::default());
    let b = phi_key(&manager, KeyGenerationOptions::default());
    assert_ne!(a.key_id(), b.key_id());
}

#[test]
fn test_key_type_must_match_generator() {
    let manager = KeyManager::new();
    assert!(manager
        .generate_signing_key(KeyType::PhiEncryption, "svc", SecurityLevel::Level3, Default::default())
        .is_err());
    assert!(manager
        .generate_encryption_key(KeyType::JwtSigning, "svc", SecurityLevel::Level3, Default::default())
        .is_err());

    let signing = manager
        .generate_signing_key(KeyType::JwtSigning, "auth", SecurityLevel::Level5, Default::default())
        .unwrap();
    assert_eq!(signing.metadata.algorithm.algorithm_name(), "ML-DSA-87");
    assert!(signing.signature_public_key().is_ok());
    assert!(signing.kem_public_key().is_err());
}

#[test]
fn test_primary_key_is_most_recent_active() {
    let manager = KeyManager::new();
    assert!(manager.get_primary_key(KeyType::PhiEncryption).unwrap().is_none());

    let _first = phi_key(&manager, KeyGenerationOptions::default());
    let second = phi_key(&manager, KeyGenerationOptions::default());

    let primary = manager.get_primary_key(KeyType::PhiEncryption).unwrap().unwrap();
    assert_eq!(primary.key_id(), second.key_id());
    assert!(manager.get_primary_key(KeyType::BackupEncryption).unwrap().is_none());
}

#[test]
fn test_rotation_safety() {
    let manager = KeyManager::new();
    let old = phi_key(&manager, KeyGenerationOptions::default().with_max_usage_count(1000));

    let envelope = encrypt_hybrid(b"viral-load:undetectable", &old.kem_public_key().unwrap(), old.key_id()).unwrap();

    let result = manager.rotate_key(old.key_id()).unwrap();
    assert_eq!(result.old_key_id, old.key_id());
    assert_ne!(result.new_key_id, result.old_key_id);
    assert!(result.reencryption_required);

    let primary = manager.get_primary_key(KeyType::PhiEncryption).unwrap().unwrap();
    assert_eq!(primary.key_id(), result.new_key_id);
    assert_eq!(primary.metadata.max_usage_count, Some(1000));
    assert_eq!(primary.metadata.tags[types::TAG_ROTATED_FROM], old.key_id());

    let active = manager.get_active_keys_by_type(KeyType::PhiEncryption).unwrap();
    assert!(active.iter().all(|key| key.key_id() != old.key_id()));

    let retained = manager.get_key(old.key_id()).unwrap();
    assert_eq!(retained.status(), KeyStatus::Deprecated);
    let key_pair = manager.get_key_pair(old.key_id()).unwrap();
    assert_eq!(
        decrypt_hybrid(&envelope, &key_pair.secret_key).unwrap(),
        b"viral-load:undetectable"
    );
}

#[test]
fn test_primary_key_stays_available_during_rotation() {
    let manager = Arc::new(KeyManager::new());
    let first = manager
        .generate_encryption_key(KeyType::PhiEncryption, "svc", SecurityLevel::Level1, Default::default())
        .unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let manager = Arc::clone(&manager);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut gaps = 0;
            loop {
                if manager.get_primary_key(KeyType::PhiEncryption).unwrap().is_none() {
                    gaps += 1;
                }
                if done.load(Ordering::SeqCst) {
                    break gaps;
                }
            }
        })
    };

    let mut current = first.key_id().to_string();
    for _ in 0..25 {
        current = manager.rotate_key(&current).unwrap().new_key_id;
    }
    done.store(true, Ordering::SeqCst);

    assert_eq!(reader.join().unwrap(), 0);
    assert_eq!(manager.get_active_keys_by_type(KeyType::PhiEncryption).unwrap().len(), 1);
    assert_eq!(manager.get_keys_by_status(KeyStatus::Deprecated).unwrap().len(), 25);
}

#[test]
fn test_rotation_preserves_policy() {
    let manager = KeyManager::new();
    let old = phi_key(
        &manager,
        KeyGenerationOptions::default()
            .with_expiry_days(30)
            .with_tag("region", "eu"),
    );
    let result = manager.rotate_key(old.key_id()).unwrap();
    let new = manager.get_key(&result.new_key_id).unwrap();

    assert_eq!(new.metadata.expiry_days(), Some(30));
    assert_eq!(new.metadata.tags["region"], "eu");
    assert_eq!(new.metadata.algorithm, old.metadata.algorithm);
    assert_eq!(new.metadata.owner, old.metadata.owner);
    assert_ne!(new.metadata.tags[types::TAG_FINGERPRINT], old.metadata.tags[types::TAG_FINGERPRINT]);
}

#[test]
fn test_signing_rotation_needs_no_reencryption() {
    let manager = KeyManager::new();
    let key = manager
        .generate_signing_key(KeyType::ApiSigning, "gateway", SecurityLevel::Level1, Default::default())
        .unwrap();
    let result = manager.rotate_key(key.key_id()).unwrap();
    assert!(!result.reencryption_required);
}

#[test]
fn test_rotate_requires_active_key() {
    let manager = KeyManager::new();
    let key = phi_key(&manager, KeyGenerationOptions::default());
    manager.rotate_key(key.key_id()).unwrap();

    let err = manager.rotate_key(key.key_id()).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidKeyState { .. }));

    let err = manager.rotate_key("no-such-key").unwrap_err();
    assert_eq!(err.error_type(), "KeyNotFoundError");
}

#[test]
fn test_keys_needing_rotation_by_usage() {
    let manager = KeyManager::new();
    let capped = phi_key(&manager, KeyGenerationOptions::default().with_max_usage_count(10));
    let _uncapped = phi_key(&manager, KeyGenerationOptions::default());

    for _ in 0..8 {
        manager.record_key_usage(capped.key_id()).unwrap();
    }
    assert!(manager.get_keys_needing_rotation().unwrap().is_empty());

    manager.record_key_usage(capped.key_id()).unwrap();
    let due = manager.get_keys_needing_rotation().unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].key_id(), capped.key_id());
}

#[test]
fn test_keys_needing_rotation_by_time() {
    let manager = KeyManager::new();
    let key = phi_key(&manager, KeyGenerationOptions::default().with_expiry_days(30));
    let now = chrono::Utc::now();

    assert!(manager.keys_needing_rotation_at(now).unwrap().is_empty());
    assert!(manager
        .keys_needing_rotation_at(now + Duration::days(24))
        .unwrap()
        .iter()
        .any(|due| due.key_id() == key.key_id()));

    // Deprecated keys are never due
    manager.rotate_key(key.key_id()).unwrap();
    let later = manager.keys_needing_rotation_at(now + Duration::days(24)).unwrap();
    assert!(later.iter().all(|due| due.key_id() != key.key_id()));
}

#[test]
fn test_record_key_usage_is_not_lost_under_contention() {
    let manager = Arc::new(KeyManager::new());
    let key = phi_key(&manager, KeyGenerationOptions::default());
    let key_id = key.key_id().to_string();

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let key_id = key_id.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    manager.record_key_usage(&key_id).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let key = manager.get_key(&key_id).unwrap();
    assert_eq!(key.metadata.usage_count, 400);
    assert!(key.metadata.last_used.is_some());
}

#[test]
fn test_mark_compromised_from_any_live_status() {
    let manager = KeyManager::new();
    let active = phi_key(&manager, KeyGenerationOptions::default());
    let deprecated = phi_key(&manager, KeyGenerationOptions::default());
    manager.rotate_key(deprecated.key_id()).unwrap();

    manager.mark_compromised(active.key_id(), "laptop stolen").unwrap();
    manager.mark_compromised(deprecated.key_id(), "backup leaked").unwrap();

    let compromised = manager.get_key(active.key_id()).unwrap();
    assert_eq!(compromised.status(), KeyStatus::Compromised);
    assert_eq!(compromised.metadata.tags[types::TAG_COMPROMISE_REASON], "laptop stolen");
    assert!(compromised.metadata.tags.contains_key(types::TAG_COMPROMISED_AT));
    assert_eq!(manager.get_key(deprecated.key_id()).unwrap().status(), KeyStatus::Compromised);

    let active_keys = manager.get_active_keys_by_type(KeyType::PhiEncryption).unwrap();
    assert!(active_keys.iter().all(|key| key.key_id() != active.key_id()));
    assert_eq!(manager.get_keys_by_status(KeyStatus::Compromised).unwrap().len(), 2);

    // Compromised material is still readable for decrypting old data
    assert!(manager.get_key_pair(active.key_id()).is_ok());
}

#[test]
fn test_destroy_key() {
    let manager = KeyManager::new();
    let key = phi_key(&manager, KeyGenerationOptions::default());
    manager.destroy_key(key.key_id()).unwrap();

    let destroyed = manager.get_key(key.key_id()).unwrap();
    assert_eq!(destroyed.status(), KeyStatus::Destroyed);
    assert_eq!(destroyed.key_material, DESTROYED_SENTINEL);
    assert_eq!(destroyed.public_key, DESTROYED_SENTINEL);

    assert!(manager.get_primary_key(KeyType::PhiEncryption).unwrap().is_none());
    assert!(matches!(
        manager.get_key_pair(key.key_id()),
        Err(CryptoError::InvalidKeyState { .. })
    ));
    assert!(manager.destroy_key(key.key_id()).is_err());
    assert!(manager.mark_compromised(key.key_id(), "too late").is_err());
    assert!(manager.record_key_usage(key.key_id()).is_err());

    let inventory = manager.export_key_inventory().unwrap();
    assert!(inventory.iter().any(|metadata| metadata.key_id == key.key_id()));
}

#[test]
fn test_destroy_compromised_key() {
    let manager = KeyManager::new();
    let key = phi_key(&manager, KeyGenerationOptions::default());
    manager.mark_compromised(key.key_id(), "incident 42").unwrap();
    manager.destroy_key(key.key_id()).unwrap();
    assert_eq!(manager.get_key(key.key_id()).unwrap().status(), KeyStatus::Destroyed);
}

#[test]
fn test_inventory_export_is_redacted() {
    let manager = KeyManager::new();
    let key = phi_key(&manager, KeyGenerationOptions::default());
    let key_pair = manager.get_key_pair(key.key_id()).unwrap();

    let json = manager.export_key_inventory_json().unwrap();
    assert!(json.contains(key.key_id()));
    assert!(json.contains("\"status\": \"ACTIVE\""));
    assert!(!json.contains("keyMaterial"));
    assert!(!json.contains(&crate::utils::to_base64(&key_pair.secret_key)));
}

#[test]
fn test_expire_keys() {
    let manager = KeyManager::new();
    let expiring = phi_key(&manager, KeyGenerationOptions::default().with_expiry_days(1));
    let lasting = phi_key(&manager, KeyGenerationOptions::default());

    assert!(manager.expire_keys().unwrap().is_empty());

    let expired = manager.expire_keys_at(chrono::Utc::now() + Duration::days(2)).unwrap();
    assert_eq!(expired, vec![expiring.key_id().to_string()]);
    assert_eq!(manager.get_key(expiring.key_id()).unwrap().status(), KeyStatus::Deprecated);
    assert_eq!(manager.get_key(lasting.key_id()).unwrap().status(), KeyStatus::Active);
}

#[test]
fn test_checkout_refuses_exhausted_key() {
    let manager = KeyManager::new();
    assert_eq!(
        manager.checkout_encryption_key(KeyType::PhiEncryption).unwrap_err().error_type(),
        "KeyNotFoundError"
    );

    let key = phi_key(&manager, KeyGenerationOptions::default().with_max_usage_count(2));
    let first = manager.checkout_encryption_key(KeyType::PhiEncryption).unwrap();
    assert_eq!(first.metadata.usage_count, 1);
    assert!(first.metadata.last_used.is_some());
    assert_eq!(
        manager.checkout_encryption_key(KeyType::PhiEncryption).unwrap().metadata.usage_count,
        2
    );

    let err = manager.checkout_encryption_key(KeyType::PhiEncryption).unwrap_err();
    assert_eq!(err.error_code(), error_codes::KEY_USAGE_EXHAUSTED);
    assert_eq!(manager.get_key(key.key_id()).unwrap().metadata.usage_count, 2);
}

#[test]
fn test_checkout_never_exceeds_usage_cap_under_contention() {
    let manager = Arc::new(KeyManager::new());
    let key = phi_key(&manager, KeyGenerationOptions::default().with_max_usage_count(3));
    let barrier = Arc::new(Barrier::new(12));

    let workers: Vec<_> = (0..12)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.checkout_encryption_key(KeyType::PhiEncryption)
            })
        })
        .collect();
    let results: Vec<_> = workers.into_iter().map(|worker| worker.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 3);
    for err in results.iter().filter_map(|result| result.as_ref().err()) {
        assert_eq!(err.error_code(), error_codes::KEY_USAGE_EXHAUSTED);
    }
    assert_eq!(manager.get_key(key.key_id()).unwrap().metadata.usage_count, 3);
}

#[test]
fn test_checkout_follows_rotation() {
    let manager = KeyManager::new();
    let old = phi_key(&manager, KeyGenerationOptions::default());
    let result = manager.rotate_key(old.key_id()).unwrap();

    let key = manager.checkout_encryption_key(KeyType::PhiEncryption).unwrap();
    assert_eq!(key.key_id(), result.new_key_id);
    assert_eq!(manager.get_key(old.key_id()).unwrap().metadata.usage_count, 0);
}

#[test]
fn test_zero_usage_cap_is_rejected() {
    let manager = KeyManager::new();
    let err = manager
        .generate_encryption_key(
            KeyType::PhiEncryption,
            "svc",
            SecurityLevel::Level1,
            KeyGenerationOptions::default().with_max_usage_count(0),
        )
        .unwrap_err();
    assert_eq!(err.error_type(), "InvalidParameter");
    assert!(manager.export_key_inventory().unwrap().is_empty());

    assert!(manager
        .generate_signing_key(
            KeyType::JwtSigning,
            "auth",
            SecurityLevel::Level1,
            KeyGenerationOptions::default().with_max_usage_count(0),
        )
        .is_err());
}

#[test]
fn test_derive_child_key() {
    let manager = KeyManager::new();
    let key = phi_key(&manager, KeyGenerationOptions::default());

    let a1 = manager.derive_child_key(key.key_id(), "patient-001", 32).unwrap();
    let a2 = manager.derive_child_key(key.key_id(), "patient-001", 32).unwrap();
    let b = manager.derive_child_key(key.key_id(), "patient-002", 32).unwrap();
    assert_eq!(*a1, *a2);
    assert_ne!(*a1, *b);

    manager.mark_compromised(key.key_id(), "incident").unwrap();
    assert!(manager.derive_child_key(key.key_id(), "patient-001", 32).is_err());
}

#[test]
fn test_audit_log_records_lifecycle() {
    let manager = KeyManager::new();
    let key = phi_key(&manager, KeyGenerationOptions::default());
    let result = manager.rotate_key(key.key_id()).unwrap();
    manager.mark_compromised(key.key_id(), "audit").unwrap();
    manager.destroy_key(key.key_id()).unwrap();

    let operations: Vec<KeyOperation> = manager
        .audit_log()
        .unwrap()
        .into_iter()
        .filter(|event| event.key_id == key.key_id())
        .map(|event| event.operation)
        .collect();
    assert_eq!(
        operations,
        vec![
            KeyOperation::Generated,
            KeyOperation::RotationStarted,
            KeyOperation::Rotated,
            KeyOperation::Compromised,
            KeyOperation::Destroyed,
        ]
    );
    assert!(manager
        .audit_log()
        .unwrap()
        .iter()
        .any(|event| event.key_id == result.new_key_id && event.operation == KeyOperation::Generated));
}

#[test]
fn test_with_config() {
    let config = PqcConfig::from_json_str(
        r#"{"default_security_level": "Level5", "rotation": {"rotation_lead_days": 14, "usage_rotation_threshold": 0.5}}"#,
    )
    .unwrap();
    let manager = KeyManager::with_config(&config).unwrap();
    assert_eq!(manager.default_security_level(), SecurityLevel::Level5);

    let key = manager
        .generate_encryption_key(
            KeyType::DataEncryption,
            "svc",
            manager.default_security_level(),
            KeyGenerationOptions::default().with_expiry_days(30).with_max_usage_count(10),
        )
        .unwrap();
    assert_eq!(
        key.metadata.rotate_at.unwrap(),
        key.metadata.expires_at.unwrap() - Duration::days(14)
    );

    for _ in 0..5 {
        manager.record_key_usage(key.key_id()).unwrap();
    }
    assert_eq!(manager.get_keys_needing_rotation().unwrap().len(), 1);
}

#[test]
fn test_store_can_be_injected() {
    let store = Arc::new(InMemoryKeyStore::new());
    let manager = KeyManager::with_store(store.clone());
    let key = phi_key(&manager, KeyGenerationOptions::default());

    assert!(store.get(key.key_id()).unwrap().is_some());
    assert_eq!(store.keys_by_type(KeyType::PhiEncryption).unwrap().len(), 1);
    assert!(store.insert(key.clone()).is_err());
}

#[test]
fn test_failed_store_update_leaves_key_unchanged() {
    let store = InMemoryKeyStore::new();
    let manager = KeyManager::new();
    let key = phi_key(&manager, KeyGenerationOptions::default());
    store.insert(key.clone()).unwrap();

    let result = store.update(key.key_id(), &mut |key: &mut StoredKey| {
        key.metadata.status = KeyStatus::Rotating;
        Err(CryptoError::integrity_error("abort"))
    });
    assert!(result.is_err());
    assert_eq!(store.get(key.key_id()).unwrap().unwrap().status(), KeyStatus::Active);
}

fn due_key(manager: &KeyManager, key_type: KeyType) -> StoredKey {
    // A five day expiry with a seven day lead is due immediately
    manager
        .generate_encryption_key(
            key_type,
            "svc",
            SecurityLevel::Level1,
            KeyGenerationOptions::default().with_expiry_days(5),
        )
        .unwrap()
}

#[test]
fn test_scheduler_rotates_due_keys_and_runs_callbacks() {
    let manager = Arc::new(KeyManager::new());
    let phi = due_key(&manager, KeyType::PhiEncryption);
    let backup = due_key(&manager, KeyType::BackupEncryption);
    let _fresh = phi_key(&manager, KeyGenerationOptions::default());

    let scheduler = RotationScheduler::new(Arc::clone(&manager), std::time::Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    scheduler.register_callback(KeyType::PhiEncryption, move |manager, result| {
        counter.fetch_add(1, Ordering::SeqCst);
        assert!(manager.get_key(&result.new_key_id).is_ok());
        Ok(())
    });

    let report = scheduler.run_once();
    assert!(!report.skipped);
    assert!(report.is_clean());
    assert_eq!(report.rotated.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(manager.get_key(phi.key_id()).unwrap().status(), KeyStatus::Deprecated);
    assert_eq!(manager.get_key(backup.key_id()).unwrap().status(), KeyStatus::Deprecated);
}

#[test]
fn test_scheduler_continues_after_callback_failure() {
    let manager = Arc::new(KeyManager::new());
    let first = due_key(&manager, KeyType::DataEncryption);
    let second = due_key(&manager, KeyType::DataEncryption);

    let scheduler = RotationScheduler::new(Arc::clone(&manager), std::time::Duration::from_secs(60));
    scheduler.register_callback(KeyType::DataEncryption, |_, result| {
        Err(CryptoError::key_management_error(
            "re-encrypt",
            &format!("downstream unavailable for {}", result.old_key_id),
            error_codes::ROTATION_CALLBACK_FAILED,
        ))
    });

    let report = scheduler.run_once();
    assert_eq!(report.rotated.len(), 2);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|failure| failure.stage == SweepStage::Callback));
    for key in [&first, &second] {
        assert_eq!(manager.get_key(key.key_id()).unwrap().status(), KeyStatus::Deprecated);
    }
}

#[test]
fn test_scheduler_reports_rotation_failures() {
    let manager = Arc::new(KeyManager::new());
    let backup = due_key(&manager, KeyType::BackupEncryption);
    let data = due_key(&manager, KeyType::DataEncryption);

    // The backup callback compromises the data key after the scan listed it
    let scheduler = RotationScheduler::new(Arc::clone(&manager), std::time::Duration::from_secs(60));
    let target = data.key_id().to_string();
    scheduler.register_callback(KeyType::BackupEncryption, move |manager, _| {
        manager.mark_compromised(&target, "found in logs")
    });

    let report = scheduler.run_once();
    assert_eq!(report.rotated.len(), 1);
    assert_eq!(report.rotated[0].old_key_id, backup.key_id());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, SweepStage::Rotation);
    assert_eq!(report.failures[0].key_id.as_deref(), Some(data.key_id()));
    assert_eq!(manager.get_key(data.key_id()).unwrap().status(), KeyStatus::Compromised);
}

#[test]
fn test_scheduler_skips_overlapping_sweeps() {
    let manager = Arc::new(KeyManager::new());
    due_key(&manager, KeyType::PhiEncryption);

    let scheduler = Arc::new(RotationScheduler::new(Arc::clone(&manager), std::time::Duration::from_secs(60)));
    let weak: Weak<RotationScheduler> = Arc::downgrade(&scheduler);
    let nested_skipped = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&nested_skipped);
    scheduler.register_callback(KeyType::PhiEncryption, move |_, _| {
        if let Some(scheduler) = weak.upgrade() {
            flag.store(scheduler.run_once().skipped, Ordering::SeqCst);
        }
        Ok(())
    });

    let report = scheduler.run_once();
    assert!(!report.skipped);
    assert!(nested_skipped.load(Ordering::SeqCst));

    // The guard is released once the sweep returns
    assert!(!scheduler.run_once().skipped);
}

#[test]
fn test_scheduler_from_config() {
    let config = PqcConfig::from_json_str(r#"{"rotation": {"check_interval_secs": 15}}"#).unwrap();
    let scheduler = RotationScheduler::from_config(Arc::new(KeyManager::new()), &config).unwrap();
    assert_eq!(scheduler.check_interval(), std::time::Duration::from_secs(15));
}

#[tokio::test]
async fn test_scheduler_task_sweeps_and_shuts_down() {
    let manager = Arc::new(KeyManager::new());
    let key = due_key(&manager, KeyType::PhiEncryption);

    let scheduler = Arc::new(RotationScheduler::new(
        Arc::clone(&manager),
        std::time::Duration::from_secs(3600),
    ));
    let mut handle = Arc::clone(&scheduler).start();

    let report = handle.next_report().await.unwrap();
    assert_eq!(report.rotated.len(), 1);
    assert_eq!(report.rotated[0].old_key_id, key.key_id());

    handle.shutdown().await;
    assert_eq!(manager.get_key(key.key_id()).unwrap().status(), KeyStatus::Deprecated);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_task_reports_only_eventful_sweeps() {
    let manager = Arc::new(KeyManager::new());
    phi_key(&manager, KeyGenerationOptions::default());

    let scheduler = Arc::new(RotationScheduler::new(
        Arc::clone(&manager),
        std::time::Duration::from_secs(1),
    ));
    let mut handle = Arc::clone(&scheduler).start();

    // Nothing is due, so no tick produces a report
    let waited = tokio::time::timeout(std::time::Duration::from_secs(10), handle.next_report()).await;
    assert!(waited.is_err());

    handle.shutdown().await;
}

#[test]
fn test_report_buffer_is_bounded() {
    let (report_tx, mut report_rx) = tokio::sync::mpsc::channel(rotation::REPORT_BUFFER);

    rotation::publish_report(&report_tx, RotationSweepReport::default());
    assert!(report_rx.try_recv().is_err());

    for i in 0..rotation::REPORT_BUFFER + 5 {
        let mut report = RotationSweepReport::default();
        report.failures.push(RotationFailure {
            key_id: Some(format!("key-{}", i)),
            stage: SweepStage::Rotation,
            error: "unavailable".to_string(),
        });
        rotation::publish_report(&report_tx, report);
    }

    let mut received = Vec::new();
    while let Ok(report) = report_rx.try_recv() {
        received.push(report);
    }
    assert_eq!(received.len(), rotation::REPORT_BUFFER);
    // Overflow drops the newest reports, not the oldest
    assert_eq!(received[0].failures[0].key_id.as_deref(), Some("key-0"));

    drop(report_rx);
    let mut report = RotationSweepReport::default();
    report.failures.push(RotationFailure {
        key_id: None,
        stage: SweepStage::Scan,
        error: "closed".to_string(),
    });
    rotation::publish_report(&report_tx, report);
}
