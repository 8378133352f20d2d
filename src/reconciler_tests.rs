// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `reconciler.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::change::RecordSet;
    use crate::config::{ReadinessConfig, ScalingGroupConfigs};
    use crate::context::{AppContext, MockBackends};
    use crate::errors::DiscoveryError;
    use crate::repository::Repository;
    use crate::settings::{DbSettings, MetricsSettings, ReconciliationSettings, Settings};
    use base64::Engine;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn test_settings(what_if: bool) -> Settings {
        Settings {
            cloud_provider: "mock".to_string(),
            db: DbSettings {
                provider: "memory".to_string(),
                table_name: "discovery-state".to_string(),
                config_item_key_id: "sg-dns-config".to_string(),
            },
            readiness: ReadinessConfig {
                enabled: false,
                ..ReadinessConfig::default()
            },
            reconciliation: ReconciliationSettings {
                what_if,
                max_concurrency: 2,
            },
            metrics: MetricsSettings {
                enabled: false,
                provider: "prometheus".to_string(),
                namespace: String::new(),
                alarms_enabled: false,
                alarms_notification_destination: String::new(),
            },
            log_identifier: "test".to_string(),
        }
    }

    fn config_json(group: &str, record_name: &str) -> serde_json::Value {
        json!({
            "scaling_group_name": group,
            "dns_config": {
                "provider": "mock",
                "dns_zone_id": "Z1",
                "record_name": record_name,
                "record_type": "A",
                "record_ttl": 60,
                "mode": "MULTIVALUE",
                "value_source": "ip:private"
            }
        })
    }

    async fn seed_configs(backends: &MockBackends, items: serde_json::Value) {
        let blob = base64::engine::general_purpose::STANDARD
            .encode(serde_json::to_vec(&items).unwrap());
        backends
            .repository
            .put("sg-dns-config", json!({ "config": blob }))
            .await
            .unwrap();
    }

    fn add_instance(backends: &MockBackends, group: &str, id: &str, ip: &str, tags: &[(&str, &str)]) {
        backends.cloud.add_instance(
            crate::providers::InstanceDescriptor {
                instance_id: id.to_string(),
                launch_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                public_ip: None,
                private_ip: Some(ip.to_string()),
                tags: tags
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
                lifecycle_state: "InService".to_string(),
            },
            Some(group),
        );
    }

    fn parse_configs(items: serde_json::Value) -> ScalingGroupConfigs {
        let blob = base64::engine::general_purpose::STANDARD
            .encode(serde_json::to_vec(&items).unwrap());
        ScalingGroupConfigs::from_document("cfg", &json!({ "config": blob })).unwrap()
    }

    #[tokio::test]
    async fn test_worker_converges_group_record() {
        let (ctx, backends) = AppContext::mock(test_settings(false));
        backends.dns.add_zone("Z1", "example.com");
        backends.dns.seed_record(
            "Z1",
            RecordSet {
                name: "api.example.com".to_string(),
                record_type: "A".to_string(),
                ttl: 60,
                weight: 0,
                priority: 0,
                values: vec!["10.0.0.9".to_string()],
            },
        );
        add_instance(&backends, "sg-a", "i-1", "10.0.0.1", &[]);
        add_instance(&backends, "sg-a", "i-2", "10.0.0.2", &[]);

        let configs = parse_configs(json!([config_json("sg-a", "api")]));
        ReconciliationCoordinator::new(ctx.clone())
            .reconcile_group(&configs.items)
            .await
            .unwrap();

        let record = backends.dns.record("Z1", "api.example.com", "A").unwrap();
        assert_eq!(record.values, vec!["10.0.0.1", "10.0.0.2"]);
        assert!(
            !ctx.lock.check("sg-a-Z1-api-A").await.unwrap(),
            "Worker releases its locks"
        );
    }

    #[tokio::test]
    async fn test_worker_convergent_state_leaves_record_untouched() {
        let (ctx, backends) = AppContext::mock(test_settings(false));
        backends.dns.add_zone("Z1", "example.com");
        let seeded = RecordSet {
            name: "api.example.com".to_string(),
            record_type: "A".to_string(),
            ttl: 300,
            weight: 0,
            priority: 0,
            values: vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
        };
        backends.dns.seed_record("Z1", seeded.clone());
        add_instance(&backends, "sg-a", "i-1", "10.0.0.1", &[]);
        add_instance(&backends, "sg-a", "i-2", "10.0.0.2", &[]);

        let configs = parse_configs(json!([config_json("sg-a", "api")]));
        ReconciliationCoordinator::new(ctx)
            .reconcile_group(&configs.items)
            .await
            .unwrap();

        let record = backends.dns.record("Z1", "api.example.com", "A").unwrap();
        assert_eq!(record, seeded, "Convergent records see no write at all");
    }

    #[tokio::test]
    async fn test_what_if_skips_apply() {
        let (ctx, backends) = AppContext::mock(test_settings(true));
        backends.dns.add_zone("Z1", "example.com");
        backends.dns.seed_record(
            "Z1",
            RecordSet {
                name: "api.example.com".to_string(),
                record_type: "A".to_string(),
                ttl: 60,
                weight: 0,
                priority: 0,
                values: vec!["10.0.0.9".to_string()],
            },
        );
        add_instance(&backends, "sg-a", "i-1", "10.0.0.1", &[]);

        let configs = parse_configs(json!([config_json("sg-a", "api")]));
        ReconciliationCoordinator::new(ctx)
            .reconcile_group(&configs.items)
            .await
            .expect("what-if workers report no error");

        let record = backends.dns.record("Z1", "api.example.com", "A").unwrap();
        assert_eq!(
            record.values,
            vec!["10.0.0.9"],
            "what-if plans but never applies"
        );
    }

    #[tokio::test]
    async fn test_worker_readiness_filter() {
        let (ctx, backends) = AppContext::mock(test_settings(false));
        backends.dns.add_zone("Z1", "example.com");
        add_instance(&backends, "sg-a", "i-1", "10.0.0.1", &[("app:ready", "yes")]);
        add_instance(&backends, "sg-a", "i-2", "10.0.0.2", &[]);

        let mut item = config_json("sg-a", "api");
        item["readiness_config"] = json!({
            "enabled": true,
            "interval_seconds": 1,
            "timeout_seconds": 3,
            "tag_key": "app:ready",
            "tag_value": "yes"
        });
        let configs = parse_configs(json!([item]));
        ReconciliationCoordinator::new(ctx)
            .reconcile_group(&configs.items)
            .await
            .unwrap();

        let record = backends.dns.record("Z1", "api.example.com", "A").unwrap();
        assert_eq!(
            record.values,
            vec!["10.0.0.1"],
            "Only instances carrying the readiness tag contribute"
        );
    }

    #[tokio::test]
    async fn test_worker_rejects_mixed_groups() {
        let (ctx, _backends) = AppContext::mock(test_settings(false));
        let configs = parse_configs(json!([
            config_json("sg-a", "api"),
            config_json("sg-b", "web")
        ]));
        let err = ReconciliationCoordinator::new(ctx)
            .reconcile_group(&configs.items)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Business(_)));
    }

    #[tokio::test]
    async fn test_worker_fails_on_held_lock_and_releases_acquired() {
        let (ctx, backends) = AppContext::mock(test_settings(false));
        backends.dns.add_zone("Z1", "example.com");
        add_instance(&backends, "sg-a", "i-1", "10.0.0.1", &[]);

        // Hold the second record's lock elsewhere
        assert!(ctx.lock.acquire("sg-a-Z1-web-A").await.unwrap());

        let configs = parse_configs(json!([
            config_json("sg-a", "api"),
            config_json("sg-a", "web")
        ]));
        let err = ReconciliationCoordinator::new(ctx.clone())
            .reconcile_group(&configs.items)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::LockContention { .. }));

        assert!(
            !ctx.lock.check("sg-a-Z1-api-A").await.unwrap(),
            "The lock the worker did acquire is released"
        );
        assert!(
            ctx.lock.check("sg-a-Z1-web-A").await.unwrap(),
            "The foreign lock is untouched"
        );
        assert!(
            backends.dns.record("Z1", "api.example.com", "A").is_none(),
            "A worker that cannot take all locks applies nothing"
        );
    }

    #[tokio::test]
    async fn test_bulk_reconciliation_isolates_failures() {
        let (ctx, backends) = AppContext::mock(test_settings(false));
        backends.dns.add_zone("Z1", "example.com");
        add_instance(&backends, "sg-a", "i-1", "10.0.0.1", &[]);
        add_instance(&backends, "sg-b", "i-2", "10.0.0.2", &[]);
        seed_configs(
            &backends,
            json!([config_json("sg-a", "api"), config_json("sg-b", "web")]),
        )
        .await;

        // sg-b's worker fails at lock acquisition; sg-a still converges
        assert!(ctx.lock.acquire("sg-b-Z1-web-A").await.unwrap());

        let outcomes = ReconciliationCoordinator::new(ctx)
            .reconcile_all()
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 2);

        let by_group: std::collections::HashMap<_, _> = outcomes
            .iter()
            .map(|o| (o.scaling_group_name.as_str(), o.error.is_some()))
            .collect();
        assert_eq!(by_group["sg-a"], false, "sg-a succeeds");
        assert_eq!(by_group["sg-b"], true, "sg-b reports its failure");

        let record = backends.dns.record("Z1", "api.example.com", "A").unwrap();
        assert_eq!(record.values, vec!["10.0.0.1"]);
        assert!(backends.dns.record("Z1", "web.example.com", "A").is_none());
    }

    #[tokio::test]
    async fn test_bulk_reconciliation_handles_many_groups_beyond_concurrency() {
        let (ctx, backends) = AppContext::mock(test_settings(false));
        backends.dns.add_zone("Z1", "example.com");
        let mut items = Vec::new();
        for i in 0..5 {
            let group = format!("sg-{i}");
            add_instance(&backends, &group, &format!("i-{i}"), &format!("10.0.1.{i}"), &[]);
            items.push(config_json(&group, &format!("rec-{i}")));
        }
        seed_configs(&backends, json!(items)).await;

        let outcomes = ReconciliationCoordinator::new(ctx)
            .reconcile_all()
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 5, "All groups run despite max_concurrency=2");
        assert!(outcomes.iter().all(|o| o.error.is_none()));
        for i in 0..5 {
            let record = backends
                .dns
                .record("Z1", &format!("rec-{i}.example.com"), "A")
                .unwrap();
            assert_eq!(record.values, vec![format!("10.0.1.{i}")]);
        }
    }

    #[tokio::test]
    async fn test_empty_worker_input_is_business_error() {
        let (ctx, _backends) = AppContext::mock(test_settings(false));
        let err = ReconciliationCoordinator::new(ctx)
            .reconcile_group(&[])
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Business(_)));
    }
}
