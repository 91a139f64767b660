//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（配置 → 引擎 → mock transport）
//! - 并发回归基线

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ResolutionMode::Static;
        let _ = contracts::DEFAULT_ROUTING_HEADER;
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{FailureKind, Message};
    use dispatcher::{create_routing_slip, RoutingSlip};
    use producer_cache::mock::{MockTransport, MockTransportConfig, SendHook};
    use serde_json::json;

    fn engine_from_toml(toml: &str, transport: &MockTransport) -> RoutingSlip<MockTransport> {
        let config = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        create_routing_slip(config, transport.clone()).unwrap()
    }

    fn slip_message(itinerary: &str) -> Message {
        let mut message = Message::new();
        message.set_header("routing_slip", itinerary);
        message
    }

    /// 配置文本 → 引擎 → mock transport 的完整链路
    #[tokio::test]
    async fn test_e2e_full_walk() {
        let transport = MockTransport::new();
        let slip = engine_from_toml("", &transport);

        let mut message = slip_message("mock:a,mock:b,mock:c");
        let report = slip.dispatch(&mut message).await.unwrap();

        assert_eq!(report.steps_sent, 3);
        assert!(report.skipped.is_empty());
        assert_eq!(transport.sends(), vec!["mock:a", "mock:b", "mock:c"]);

        // 同一目的地复用缓存的生产者
        let report = slip.dispatch(&mut slip_message("mock:a,mock:b,mock:c")).await.unwrap();
        assert_eq!(report.steps_sent, 3);
        assert_eq!(transport.total_opens(), 3);
    }

    #[tokio::test]
    async fn test_e2e_skip_invalid_destination() {
        let transport = MockTransport::new();
        let slip = engine_from_toml("ignore_invalid_endpoints = true", &transport);

        let mut message = slip_message("bogus:x,mock:y");
        let report = slip.dispatch(&mut message).await.unwrap();

        assert_eq!(report.steps_sent, 1);
        assert_eq!(report.skipped, vec!["bogus:x"]);
        assert_eq!(transport.sends(), vec!["mock:y"]);
    }

    #[tokio::test]
    async fn test_e2e_invalid_destination_fails_by_default() {
        let transport = MockTransport::new();
        let slip = engine_from_toml("", &transport);

        let err = slip
            .dispatch(&mut slip_message("bogus:x,mock:y"))
            .await
            .unwrap_err();

        assert_eq!(err.uri.as_deref(), Some("bogus:x"));
        assert_eq!(err.source.kind(), FailureKind::InvalidDestination);
        assert!(transport.sends().is_empty());
    }

    /// 容量为 1 的缓存：a,b,a ⇒ b 淘汰 a，第三步重新打开 a
    #[tokio::test]
    async fn test_e2e_lru_eviction_walk() {
        let transport = MockTransport::new();
        let slip = engine_from_toml("cache_size = 1", &transport);

        let report = slip
            .dispatch(&mut slip_message("mock:a,mock:b,mock:a"))
            .await
            .unwrap();

        assert_eq!(report.steps_sent, 3);
        assert_eq!(transport.sends(), vec!["mock:a", "mock:b", "mock:a"]);
        assert_eq!(transport.open_count("mock:a"), 2);
        assert_eq!(transport.open_count("mock:b"), 1);
        // 被淘汰的生产者按序关闭
        assert_eq!(transport.closes(), vec!["mock:a", "mock:b"]);
        assert_eq!(transport.currently_open(), 1);
        assert_eq!(slip.cache_metrics().snapshot().evictions, 2);

        slip.shutdown().await;
        assert_eq!(transport.currently_open(), 0);
    }

    #[tokio::test]
    async fn test_e2e_config_file_to_engine() {
        use std::io::Write;

        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(
            br#"
header = "next_hops"
delimiter = ";"
ignore_invalid_endpoints = true
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        let transport = MockTransport::new();
        let slip = create_routing_slip(config, transport.clone()).unwrap();

        let mut message = Message::new();
        message.set_header("next_hops", "mock:a;bogus:x;mock:b");
        let report = slip.dispatch(&mut message).await.unwrap();

        assert_eq!(report.steps_sent, 2);
        assert_eq!(report.skipped, vec!["bogus:x"]);
        assert_eq!(transport.sends(), vec!["mock:a", "mock:b"]);
    }

    #[tokio::test]
    async fn test_e2e_array_header_bypasses_splitting() {
        let transport = MockTransport::new();
        let slip = engine_from_toml("", &transport);

        let mut message = Message::new();
        message.set_header("routing_slip", json!(["mock:a", "mock:b"]));
        let report = slip.dispatch(&mut message).await.unwrap();

        assert_eq!(report.steps_sent, 2);
        assert_eq!(transport.sends(), vec!["mock:a", "mock:b"]);
    }

    /// 动态模式：前一步改写路由头后，后续步按新行程继续
    #[tokio::test]
    async fn test_e2e_dynamic_re_resolution() {
        let hook: SendHook = Arc::new(|uri: &str, message: &mut Message| {
            if uri == "mock:a" {
                message.set_header("routing_slip", "mock:a,mock:c");
            }
        });
        let transport = MockTransport::with_config(MockTransportConfig {
            send_hook: Some(hook),
            ..MockTransportConfig::default()
        });
        let slip = engine_from_toml(r#"resolution = "dynamic""#, &transport);

        let report = slip
            .dispatch(&mut slip_message("mock:a,mock:b"))
            .await
            .unwrap();

        assert_eq!(report.steps_sent, 2);
        assert_eq!(transport.sends(), vec!["mock:a", "mock:c"]);
    }

    /// 并发分发共享一个缓存：单飞打开，峰值受限
    #[tokio::test]
    async fn test_concurrent_dispatch_shares_cache() {
        let transport = MockTransport::new();
        let slip = Arc::new(engine_from_toml("", &transport));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let slip = Arc::clone(&slip);
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    let mut message = slip_message("mock:a,mock:b,mock:c");
                    let report = slip.dispatch(&mut message).await.unwrap();
                    assert_eq!(report.steps_sent, 3);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 每个目的地只打开一次，无论多少并发分发
        assert_eq!(transport.total_opens(), 3);
        assert!(transport.peak_open() <= 3);
        assert_eq!(transport.sends().len(), 16 * 10 * 3);
        assert_eq!(slip.metrics().succeeded(), 160);
        assert_eq!(slip.cache_metrics().snapshot().evictions, 0);
    }

    /// 并发分发各自保持行程内顺序
    #[tokio::test]
    async fn test_concurrent_dispatch_preserves_per_walk_order() {
        let transport = MockTransport::new();
        let slip = Arc::new(engine_from_toml("", &transport));

        let mut handles = Vec::new();
        for task in 0..8 {
            let slip = Arc::clone(&slip);
            handles.push(tokio::spawn(async move {
                let itinerary = format!("mock:{task}-a,mock:{task}-b,mock:{task}-c");
                slip.dispatch(&mut slip_message(&itinerary)).await.unwrap()
            }));
        }
        for handle in handles {
            let report = handle.await.unwrap();
            assert_eq!(report.steps_sent, 3);
        }

        let sends = transport.sends();
        for task in 0..8 {
            let prefix = format!("mock:{task}-");
            let walk: Vec<_> = sends.iter().filter(|uri| uri.starts_with(&prefix)).collect();
            assert_eq!(
                walk,
                vec![
                    &format!("mock:{task}-a"),
                    &format!("mock:{task}-b"),
                    &format!("mock:{task}-c")
                ]
            );
        }
    }

    /// 有界缓存在持续淘汰下不泄漏生产者
    #[tokio::test]
    async fn test_bounded_cache_closes_all_evicted() {
        let transport = MockTransport::new();
        let slip = engine_from_toml("cache_size = 2", &transport);

        for round in 0..4 {
            for uri in ["mock:a", "mock:b", "mock:c", "mock:d", "mock:e"] {
                let report = slip.dispatch(&mut slip_message(uri)).await.unwrap();
                assert_eq!(report.steps_sent, 1, "round {round}, uri {uri}");
            }
        }

        assert!(transport.currently_open() <= 2);
        assert_eq!(
            transport.closes().len() + transport.currently_open(),
            transport.total_opens()
        );

        slip.shutdown().await;
        assert_eq!(transport.currently_open(), 0);
    }

    /// 关闭后在途分发快速失败，新分发同样失败
    #[tokio::test]
    async fn test_shutdown_mid_traffic_fails_fast() {
        let transport = MockTransport::with_config(MockTransportConfig {
            send_delay: Some(Duration::from_millis(50)),
            ..MockTransportConfig::default()
        });
        let slip = Arc::new(engine_from_toml("", &transport));

        let walker = {
            let slip = Arc::clone(&slip);
            tokio::spawn(async move {
                let mut message =
                    slip_message("mock:a,mock:b,mock:c,mock:d,mock:e,mock:f,mock:g,mock:h");
                slip.dispatch(&mut message).await
            })
        };

        tokio::time::sleep(Duration::from_millis(120)).await;
        slip.shutdown().await;

        let err = walker.await.unwrap().unwrap_err();
        assert_eq!(err.source.kind(), FailureKind::ShutDown);
        assert!(err.steps_sent < 8);

        let err = slip.dispatch(&mut slip_message("mock:a")).await.unwrap_err();
        assert_eq!(err.source.kind(), FailureKind::ShutDown);
        assert_eq!(transport.currently_open(), 0);
    }
}
