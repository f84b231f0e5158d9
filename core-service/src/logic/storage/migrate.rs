//! Schema migrations
//!
//! - v0: unversioned, fields optionally wrapped under `data`
//! - v1 -> v2: drop `last_known_values`, add `learned_priors`
//! - v2.0 -> v2.1: ensure both history arrays
//!
//! Each step only adds or removes keys, so running it twice is a no-op.

use serde_json::{json, Map, Value};

use crate::constants::{STORAGE_VERSION, STORAGE_VERSION_MINOR};
use crate::logic::error::StorageError;

/// Missing or non-numeric version fields read as 0
fn version_field(value: &Value, key: &str) -> Result<u32, StorageError> {
    let Some(raw) = value.get(key).and_then(Value::as_u64) else {
        return Ok(0);
    };
    u32::try_from(raw).map_err(|_| StorageError::UnsupportedVersion {
        found: raw,
        supported: STORAGE_VERSION,
    })
}

pub fn stored_version(value: &Value) -> Result<(u32, u32), StorageError> {
    Ok((version_field(value, "version")?, version_field(value, "version_minor")?))
}

pub fn migrate(value: Value) -> Result<Value, StorageError> {
    let (mut major, mut minor) = stored_version(&value)?;
    if major > STORAGE_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: major.into(),
            supported: STORAGE_VERSION,
        });
    }

    let Value::Object(mut obj) = value else {
        return Err(StorageError::InvalidFormat("root is not an object".into()));
    };

    if major == 0 {
        lift_data(&mut obj);
        major = 1;
        minor = 0;
        log::info!("Migrated stored state v0 -> v1");
    }

    if major == 1 {
        obj.remove("last_known_values");
        major = 2;
        minor = 0;
        log::info!("Migrated stored state v1 -> v2");
    }
    obj.entry("learned_priors").or_insert_with(|| json!({}));

    if minor < 1 {
        minor = 1;
    }
    obj.entry("probability_history").or_insert_with(|| json!([]));
    obj.entry("occupancy_history").or_insert_with(|| json!([]));

    obj.insert("version".into(), json!(major));
    obj.insert("version_minor".into(), json!(minor.max(STORAGE_VERSION_MINOR)));
    Ok(Value::Object(obj))
}

fn lift_data(obj: &mut Map<String, Value>) {
    if let Some(Value::Object(data)) = obj.remove("data") {
        for (key, value) in data {
            obj.entry(key).or_insert(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v0_wrapped_lifted() {
        let v0 = json!({
            "data": {
                "probability_history": [0.2, 0.3],
                "last_known_values": {"binary_sensor.m": "on"}
            }
        });
        let migrated = migrate(v0).unwrap();

        assert_eq!(migrated["version"], 2);
        assert_eq!(migrated["version_minor"], 1);
        assert_eq!(migrated["probability_history"], json!([0.2, 0.3]));
        assert_eq!(migrated["occupancy_history"], json!([]));
        assert_eq!(migrated["learned_priors"], json!({}));
        assert!(migrated.get("last_known_values").is_none());
        assert!(migrated.get("data").is_none());
    }

    #[test]
    fn test_v1_drops_last_known_values() {
        let v1 = json!({"version": 1, "last_known_values": {}, "occupancy_history": [true]});
        let migrated = migrate(v1).unwrap();
        assert!(migrated.get("last_known_values").is_none());
        assert_eq!(migrated["occupancy_history"], json!([true]));
        assert_eq!(
            stored_version(&migrated).unwrap(),
            (STORAGE_VERSION, STORAGE_VERSION_MINOR)
        );
    }

    #[test]
    fn test_migration_idempotent() {
        let v0 = json!({"probability_history": [0.5]});
        let once = migrate(v0).unwrap();
        let twice = migrate(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_future_version_rejected() {
        let err = migrate(json!({"version": 3})).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedVersion { found: 3, .. }));
    }

    #[test]
    fn test_oversized_version_rejected() {
        // 2^32 + 2 would truncate to v2 if narrowed with `as`
        let err = migrate(json!({"version": 4_294_967_298u64})).unwrap_err();
        assert!(matches!(
            err,
            StorageError::UnsupportedVersion { found: 4_294_967_298, .. }
        ));

        let err = migrate(json!({"version": 2, "version_minor": u64::MAX})).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(migrate(json!([1, 2])).is_err());
    }
}
