use proptest::prelude::*;
use sdk::catalog::{is_restricted_id, Catalog, ModuleDescriptor};
use sdk::errors::{ProviderError, ProviderErrorExt};
use sdk::types::ModuleRecord;

// Error hints are static strings and never echo caller-supplied text
proptest! {
    #[test]
    fn test_error_user_hint_completeness(detail in "[a-zA-Z0-9/_.-]{8,40}") {
        let errs = vec![
            ProviderError::InvalidRecord(detail.clone()),
            ProviderError::InstallFailed { id: detail.clone(), reason: detail.clone() },
            ProviderError::CheckFailed(detail.clone()),
            ProviderError::UpdateInProgress(detail.clone()),
            ProviderError::Store(detail.clone()),
            ProviderError::Config(detail.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&detail));
        }
    }
}

// A record is installed exactly when it carries a version
proptest! {
    #[test]
    fn test_installed_iff_version(version in "([0-9]{1,3}(\\.[0-9]{1,3}){0,3})?", enabled: bool, hidden: bool) {
        let record = ModuleRecord::new("gmp-test")
            .with_version(version.clone())
            .with_enabled(enabled)
            .with_hidden(hidden);
        prop_assert_eq!(record.is_installed(), !version.is_empty());
    }
}

proptest! {
    #[test]
    fn test_record_json_keeps_fields(
        id in "gmp-[a-z0-9-]{1,20}",
        version in "[0-9]\\.[0-9]\\.[0-9]\\.[0-9]",
        last_update in 0i64..=4_102_444_800_000i64,
        enabled: bool,
        auto_update: bool,
    ) {
        let mut record = ModuleRecord::new(id)
            .with_version(version)
            .with_enabled(enabled)
            .with_last_update(last_update);
        record.auto_update = auto_update;

        let json = serde_json::to_string(&record).unwrap();
        let parsed: ModuleRecord = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(record, parsed);
    }
}

proptest! {
    #[test]
    fn test_restricted_only_by_prefix(suffix in "[a-z0-9-]{1,16}") {
        let eme_id = format!("gmp-eme-{}", suffix);
        let plain_id = format!("gmp-{}", suffix);
        prop_assert!(is_restricted_id(&eme_id));
        prop_assert_eq!(is_restricted_id(&plain_id), plain_id.starts_with("gmp-eme-"));

        let catalog = Catalog::builtin_with(vec![ModuleDescriptor::new(eme_id.clone(), "x", "y")]);
        prop_assert!(catalog.require(&eme_id).is_ok());
    }
}
