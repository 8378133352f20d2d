// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `planner.rs`

#[cfg(test)]
mod tests {
    use super::super::{normalize_record_name, RecordPlanner};
    use crate::change::{BatchAction, ChangeAction, ChangeRequest, RecordSet};
    use crate::config::{
        DnsRecordConfig, ProceedMode, RecordMode, RecordProvider, ScalingGroupConfig,
    };
    use crate::event::LifecycleTransition;
    use crate::memory::{MemoryCloudProvider, MemoryDnsProvider};
    use crate::providers::InstanceDescriptor;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn test_config(mode: RecordMode, managed: bool) -> ScalingGroupConfig {
        ScalingGroupConfig {
            scaling_group_name: "sg-a".to_string(),
            scaling_group_valid_states: vec!["InService".to_string()],
            multiple_config_proceed_mode: ProceedMode::AllOperational,
            dns_config: DnsRecordConfig {
                provider: RecordProvider::Mock,
                dns_zone_id: "Z1".to_string(),
                record_name: "api".to_string(),
                record_ttl: 60,
                record_type: "A".to_string(),
                record_priority: 0,
                record_weight: 0,
                mode,
                value_source: "ip:private".to_string(),
                managed_dns_record: managed,
                dns_mock_value: "1.0.0.217".to_string(),
            },
            health_check_config: None,
            readiness_config: None,
        }
    }

    fn record(values: &[&str]) -> RecordSet {
        RecordSet {
            name: "api.example.com".to_string(),
            record_type: "A".to_string(),
            ttl: 300,
            weight: 0,
            priority: 0,
            values: values.iter().map(ToString::to_string).collect(),
        }
    }

    fn setup() -> (RecordPlanner, Arc<MemoryDnsProvider>, Arc<MemoryCloudProvider>) {
        let dns = Arc::new(MemoryDnsProvider::new());
        dns.add_zone("Z1", "example.com");
        let cloud = Arc::new(MemoryCloudProvider::new());
        let resolver = crate::metadata::MetadataResolver::new(cloud.clone(), cloud.clone());
        (RecordPlanner::new(dns.clone(), resolver), dns, cloud)
    }

    fn instance(id: &str, launch_secs: i64, private_ip: &str) -> InstanceDescriptor {
        InstanceDescriptor {
            instance_id: id.to_string(),
            launch_time: Utc.timestamp_opt(launch_secs, 0).unwrap(),
            public_ip: None,
            private_ip: Some(private_ip.to_string()),
            tags: BTreeMap::new(),
            lifecycle_state: "InService".to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Normalization
    // ------------------------------------------------------------------

    #[test]
    fn test_normalize_appends_zone() {
        assert_eq!(
            normalize_record_name("api", "example.com"),
            "api.example.com"
        );
    }

    #[test]
    fn test_normalize_strips_trailing_dot() {
        assert_eq!(
            normalize_record_name("api.example.com.", "example.com."),
            "api.example.com"
        );
    }

    #[test]
    fn test_normalize_keeps_qualified_names() {
        assert_eq!(
            normalize_record_name("api.example.com", "example.com"),
            "api.example.com"
        );
    }

    #[test]
    fn test_normalize_apex_itself() {
        assert_eq!(
            normalize_record_name("example.com", "example.com"),
            "example.com"
        );
    }

    #[test]
    fn test_normalize_does_not_match_partial_suffix() {
        // "badexample.com" does not end in the label boundary ".example.com"
        assert_eq!(
            normalize_record_name("badexample.com", "example.com"),
            "badexample.com.example.com"
        );
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            name in "[a-z]{1,8}(\\.[a-z]{1,8}){0,2}\\.?",
            zone in "[a-z]{1,8}\\.[a-z]{2,3}",
        ) {
            let once = normalize_record_name(&name, &zone);
            let twice = normalize_record_name(&once, &zone);
            prop_assert_eq!(&once, &twice);
            let dotted_zone = [".", zone.as_str()].concat();
            prop_assert!(once == zone || once.ends_with(&dotted_zone));
        }
    }

    proptest! {
        #[test]
        fn prop_change_values_deterministic(values in proptest::collection::vec("[a-z0-9.]{1,12}", 0..8)) {
            let change = ChangeRequest::new(
                ChangeAction::Update,
                "api.example.com",
                "A",
                60,
                0,
                0,
                values,
            ).unwrap();
            let mut expected = change.record_values.clone();
            expected.sort();
            expected.dedup();
            prop_assert_eq!(&change.record_values, &expected, "emitted values are sorted and deduplicated");
        }
    }

    // ------------------------------------------------------------------
    // LAUNCHING
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_launching_empty_record_creates() {
        let (planner, _, _) = setup();
        let config = test_config(RecordMode::Multivalue, false);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Launching, &["10.0.0.1".into()])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Create);
        assert_eq!(change.record_name, "api.example.com");
        assert_eq!(change.record_ttl, 60);
        assert_eq!(change.record_values, vec!["10.0.0.1"]);
    }

    #[tokio::test]
    async fn test_launching_augments_existing_record() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["10.0.0.1"]));
        let config = test_config(RecordMode::Multivalue, false);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Launching, &["10.0.0.2".into()])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Update);
        assert_eq!(change.record_values, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[tokio::test]
    async fn test_launching_subset_is_ignore() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["10.0.0.1", "10.0.0.2"]));
        let config = test_config(RecordMode::Multivalue, false);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Launching, &["10.0.0.1".into()])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Ignore);
    }

    #[tokio::test]
    async fn test_launching_no_values_is_ignore() {
        let (planner, _, _) = setup();
        let config = test_config(RecordMode::Multivalue, false);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Launching, &[])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Ignore);
    }

    #[tokio::test]
    async fn test_launching_single_mode_keeps_first_desired() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["10.0.0.9"]));
        let config = test_config(RecordMode::Single, false);
        let change = planner
            .plan_with_values(
                &config,
                LifecycleTransition::Launching,
                &["10.0.0.2".into(), "10.0.0.3".into()],
            )
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Update);
        assert_eq!(
            change.record_values,
            vec!["10.0.0.2"],
            "SINGLE mode keeps the first desired value only"
        );
    }

    #[tokio::test]
    async fn test_launching_replaces_mock_on_managed_record() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["1.0.0.217"]));
        let config = test_config(RecordMode::Multivalue, true);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Launching, &["10.0.0.1".into()])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Update);
        assert_eq!(
            change.record_values,
            vec!["10.0.0.1"],
            "Mock value is not part of the current set of a managed record"
        );
    }

    // ------------------------------------------------------------------
    // DRAINING
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_draining_absent_record_is_ignore() {
        let (planner, _, _) = setup();
        let config = test_config(RecordMode::Multivalue, false);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Draining, &["10.0.0.1".into()])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Ignore);
    }

    #[tokio::test]
    async fn test_draining_removes_value() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["10.0.0.1", "10.0.0.2"]));
        let config = test_config(RecordMode::Multivalue, false);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Draining, &["10.0.0.1".into()])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Update);
        assert_eq!(change.record_values, vec!["10.0.0.2"]);
        assert_eq!(change.record_ttl, 300, "Draining keeps the record's TTL");
    }

    #[tokio::test]
    async fn test_draining_empties_managed_record_to_mock() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["10.0.0.1"]));
        let config = test_config(RecordMode::Multivalue, true);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Draining, &["10.0.0.1".into()])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Update, "Managed records are never deleted");
        assert_eq!(change.record_values, vec!["1.0.0.217"]);
    }

    #[tokio::test]
    async fn test_draining_empties_unmanaged_record_to_delete() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["10.0.0.1"]));
        let config = test_config(RecordMode::Multivalue, false);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Draining, &["10.0.0.1".into()])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Delete);
        assert_eq!(
            change.record_values,
            vec!["10.0.0.1"],
            "DELETE carries the current values for provider identification"
        );
    }

    #[tokio::test]
    async fn test_draining_managed_record_on_mock_only_is_ignore() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["1.0.0.217"]));
        let config = test_config(RecordMode::Multivalue, true);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Draining, &["10.0.0.1".into()])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Ignore);
    }

    // ------------------------------------------------------------------
    // RECONCILING
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_reconciling_convergent_is_ignore() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["10.0.0.1", "10.0.0.2"]));
        let config = test_config(RecordMode::Multivalue, false);
        let change = planner
            .plan_with_values(
                &config,
                LifecycleTransition::Reconciling,
                &["10.0.0.1".into(), "10.0.0.2".into()],
            )
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Ignore);
    }

    #[tokio::test]
    async fn test_reconciling_divergent_updates_to_desired() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["10.0.0.9"]));
        let config = test_config(RecordMode::Multivalue, false);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Reconciling, &["10.0.0.1".into()])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Update);
        assert_eq!(change.record_values, vec!["10.0.0.1"]);
    }

    #[tokio::test]
    async fn test_reconciling_absent_record_creates() {
        let (planner, _, _) = setup();
        let config = test_config(RecordMode::Multivalue, false);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Reconciling, &["10.0.0.1".into()])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Create);
    }

    #[tokio::test]
    async fn test_reconciling_empty_desired_managed_parks_on_mock() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["10.0.0.1"]));
        let config = test_config(RecordMode::Multivalue, true);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Reconciling, &[])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Update);
        assert_eq!(change.record_values, vec!["1.0.0.217"]);
    }

    #[tokio::test]
    async fn test_reconciling_empty_desired_unmanaged_deletes() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["10.0.0.1"]));
        let config = test_config(RecordMode::Multivalue, false);
        let change = planner
            .plan_with_values(&config, LifecycleTransition::Reconciling, &[])
            .await
            .unwrap();
        assert_eq!(change.action, ChangeAction::Delete);
        assert_eq!(change.record_values, vec!["10.0.0.1"]);
    }

    #[tokio::test]
    async fn test_reconciling_single_mode_truncates_to_first() {
        let (planner, _, _) = setup();
        let config = test_config(RecordMode::Single, false);
        let change = planner
            .plan_with_values(
                &config,
                LifecycleTransition::Reconciling,
                &["10.0.0.2".into(), "10.0.0.1".into()],
            )
            .await
            .unwrap();
        assert_eq!(change.record_values, vec!["10.0.0.2"]);
    }

    // ------------------------------------------------------------------
    // Idempotence and managed safety
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_planning_is_idempotent_after_apply() {
        let (planner, dns, _) = setup();
        let config = test_config(RecordMode::Multivalue, false);
        let desired: Vec<String> = vec!["10.0.0.1".into(), "10.0.0.2".into()];

        let first = planner
            .plan_with_values(&config, LifecycleTransition::Reconciling, &desired)
            .await
            .unwrap();
        let second = planner
            .plan_with_values(&config, LifecycleTransition::Reconciling, &desired)
            .await
            .unwrap();
        assert_eq!(first, second, "Two planner runs over fixed inputs agree");

        let applier = crate::applier::ChangeApplier::new(dns.clone());
        applier.apply(&config, &first).await.unwrap();

        let replanned = planner
            .plan_with_values(&config, LifecycleTransition::Reconciling, &desired)
            .await
            .unwrap();
        assert_eq!(
            replanned.action,
            ChangeAction::Ignore,
            "Applying the emitted change and replanning yields IGNORE"
        );
    }

    #[tokio::test]
    async fn test_managed_record_never_deleted_by_drain_sequence() {
        let (planner, dns, _) = setup();
        dns.seed_record("Z1", record(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]));
        let config = test_config(RecordMode::Multivalue, true);
        let applier = crate::applier::ChangeApplier::new(dns.clone());

        for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            let change = planner
                .plan_with_values(&config, LifecycleTransition::Draining, &[ip.to_string()])
                .await
                .unwrap();
            assert_ne!(
                change.action,
                ChangeAction::Delete,
                "A managed record must never see DELETE"
            );
            applier.apply(&config, &change).await.unwrap();
        }

        let final_record = dns.record("Z1", "api.example.com", "A").unwrap();
        assert_eq!(final_record.values, vec!["1.0.0.217"]);
    }

    // ------------------------------------------------------------------
    // Metadata-driven planning
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_plan_resolves_event_instance() {
        let (planner, _, cloud) = setup();
        cloud.add_instance(instance("i-1", 1_700_000_000, "10.0.0.1"), Some("sg-a"));
        let config = test_config(RecordMode::Multivalue, false);
        let event = {
            let mut e = crate::event::LifecycleEvent::reconciling("sg-a");
            e.transition = LifecycleTransition::Launching;
            e.instance_id = "i-1".to_string();
            e
        };
        let change = planner.plan(&config, &event).await.unwrap();
        assert_eq!(change.action, ChangeAction::Create);
        assert_eq!(change.record_values, vec!["10.0.0.1"]);
    }

    #[tokio::test]
    async fn test_plan_reconciling_enumerates_group() {
        let (planner, _, cloud) = setup();
        cloud.add_instance(instance("i-2", 1_700_000_100, "10.0.0.2"), Some("sg-a"));
        cloud.add_instance(instance("i-1", 1_700_000_000, "10.0.0.1"), Some("sg-a"));
        let mut terminating = instance("i-3", 1_700_000_200, "10.0.0.3");
        terminating.lifecycle_state = "Terminating".to_string();
        cloud.add_instance(terminating, Some("sg-a"));

        let config = test_config(RecordMode::Multivalue, false);
        let event = crate::event::LifecycleEvent::reconciling("sg-a");
        let change = planner.plan(&config, &event).await.unwrap();
        assert_eq!(change.action, ChangeAction::Create);
        assert_eq!(
            change.record_values,
            vec!["10.0.0.1", "10.0.0.2"],
            "Only instances in valid lifecycle states contribute"
        );
    }

    #[test]
    fn test_batch_action_for_delete() {
        let change = ChangeRequest::new(
            ChangeAction::Delete,
            "api.example.com",
            "A",
            60,
            0,
            0,
            vec!["10.0.0.1".to_string()],
        )
        .unwrap();
        let batch = change
            .to_batch(RecordProvider::Mock)
            .unwrap()
            .expect("DELETE encodes to a batch");
        assert_eq!(batch.changes[0].action, BatchAction::Delete);
    }
}
