//! Integration tests for request preparation through the client pipeline.

#[cfg(test)]
mod tests {
    use crate::config::{ClientConfig, StageSettings};
    use crate::errors::{ClientflowError, ServiceKind};
    use crate::events::{CollectingEventSink, SCOPE_FAILED, SCOPE_INITIALIZED};
    use crate::pipeline::Client;
    use crate::providers::{same_provider, ProviderClass, ProviderContract, ProviderInstance};
    use crate::request::{ClientRequest, Method};
    use crate::scope::ScopeSlot;
    use crate::services::MediaType;
    use crate::stages::{RequestStage, ScopeInitializationStage};
    use crate::testing::{
        assert_scope_initialized, assert_scope_unpublished, ClosingProvider, FaultInjectingResolver,
        JsonProvider, PlainTextWriter, RecordingStage, SlowStage, StaticContextResolver,
        StatusMapper,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn json_client() -> Client {
        Client::builder()
            .with_class(ProviderClass::of::<JsonProvider>("json"))
            .build()
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_get_isolated_scopes() {
        let client = Client::builder()
            .with_class(ProviderClass::of::<JsonProvider>("json"))
            .with_stage(Arc::new(SlowStage::with_delay_ms("yield", 2)))
            .build()
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                let mut request = client.request(Method::Post, format!("https://example.test/{i}"));
                if i % 2 == 0 {
                    request = request.register_instance(ProviderInstance::from_provider(
                        format!("text-{i}"),
                        PlainTextWriter,
                    ));
                }
                (i, client.prepare(request).await.unwrap())
            }));
        }

        let mut scope_ids = HashSet::new();
        for handle in handles {
            let (i, request) = handle.await.unwrap();
            assert_scope_initialized(&request);
            let scope = request.scope().unwrap();
            assert!(scope_ids.insert(scope.id()));

            let workers = request.message_body_workers().unwrap();
            assert_eq!(workers.scope_id(), scope.id());
            assert_eq!(scope.exception_mappers().unwrap().scope_id(), scope.id());
            assert_eq!(scope.context_resolvers().unwrap().scope_id(), scope.id());

            // only this request's own text writer is visible
            let text_writers: Vec<String> = workers
                .writer_ids()
                .into_iter()
                .map(|id| id.as_str().to_string())
                .filter(|id| id.starts_with("text-"))
                .collect();
            if i % 2 == 0 {
                assert_eq!(text_writers, vec![format!("text-{i}")]);
            } else {
                assert!(text_writers.is_empty());
            }
        }
        assert_eq!(scope_ids.len(), 32);
        assert!(client.config().provider_instances().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_all_keeps_requests_apart() {
        let client = json_client();
        let requests = vec![
            client.request(Method::Get, "https://example.test/a"),
            ClientRequest::new(Method::Get, "https://example.test/no-config"),
            client.request(Method::Get, "https://example.test/c"),
        ];

        let results = client.prepare_all(requests).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ClientflowError::InvalidRequest(_))));
        let a = results[0].as_ref().unwrap().scope().unwrap();
        let c = results[2].as_ref().unwrap().scope().unwrap();
        assert!(!a.same_scope(c));
    }

    #[tokio::test]
    async fn test_successful_preparation_is_consistent() {
        let client = json_client();
        let request = client
            .request(Method::Put, "https://example.test/items/7")
            .with_entity(json!({"id": 7}), MediaType::application_json());

        let request = client.prepare(request).await.unwrap();

        assert_scope_initialized(&request);
        let scope = request.scope().unwrap();
        for slot in ScopeSlot::ALL {
            assert!(scope.is_set(slot), "slot {slot} is unset");
        }
        assert_eq!(request.body(), Some(&br#"{"id":7}"#[..]));
    }

    #[tokio::test]
    async fn test_injected_failure_on_each_service_leaves_no_state() {
        for kind in ServiceKind::ALL {
            let resolver = Arc::new(FaultInjectingResolver::new().failing_on(kind));
            let events = Arc::new(CollectingEventSink::new());
            let client = Client::builder()
                .with_class(ProviderClass::of::<JsonProvider>("json"))
                .with_resolver(resolver.clone())
                .with_event_sink(events.clone())
                .build()
                .unwrap();
            let config = Arc::clone(client.config());
            let stage = ScopeInitializationStage::new(config, resolver.clone());
            let mut request = client.request(Method::Get, "https://example.test/");

            let err = stage.initialize(&mut request).unwrap_err();
            assert!(matches!(err, ClientflowError::ServiceMaterialization(ref e) if e.service == kind));
            assert_scope_unpublished(&request);
            let scope = resolver.last_scope().unwrap();
            assert!(scope.populated_slots().is_empty(), "{kind}: slots were published");

            let err = client.prepare(request).await.unwrap_err();
            assert!(err.is_setup_error());
            assert_eq!(events.events_of_type(SCOPE_FAILED).len(), 1);
            assert!(events.events_of_type(SCOPE_INITIALIZED).is_empty());
        }
    }

    #[tokio::test]
    async fn test_context_resolver_failure_scenario() {
        let resolver =
            Arc::new(FaultInjectingResolver::new().failing_on(ServiceKind::ContextResolvers));
        let config =
            Arc::new(ClientConfig::new().with_class(ProviderClass::of::<JsonProvider>("json")));
        let stage = ScopeInitializationStage::new(Arc::clone(&config), resolver.clone());
        let mut request = ClientRequest::new(Method::Post, "https://example.test/")
            .with_configuration(config);

        let err = stage.initialize(&mut request).unwrap_err();

        assert!(matches!(
            err,
            ClientflowError::ServiceMaterialization(ref e) if e.service == ServiceKind::ContextResolvers
        ));
        assert!(request.message_body_workers().is_none());
        assert_eq!(
            resolver.calls(),
            vec![
                ServiceKind::ExceptionMappers,
                ServiceKind::MessageBodyWorkers,
                ServiceKind::ContextResolvers
            ]
        );
    }

    #[tokio::test]
    async fn test_request_instance_overrides_pipeline_class_of_same_identity() {
        let client = json_client();
        let override_instance = ProviderInstance::from_provider("json", JsonProvider);
        let request = client
            .request(Method::Get, "https://example.test/")
            .register_instance(override_instance.clone());

        let request = client.prepare(request).await.unwrap();

        let workers = request.message_body_workers().unwrap();
        let reader = workers
            .reader_provider_for(&MediaType::application_json())
            .unwrap();
        assert!(same_provider(&reader.provider, override_instance.provider()));
        assert_eq!(workers.reader_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_instance_b_wins_over_class_a_of_same_capability() {
        let closed = Arc::new(AtomicUsize::new(0));
        let client = Client::builder()
            .with_class(ProviderClass::of::<JsonProvider>("a"))
            .with_class(ClosingProvider::class("pooled", closed.clone()))
            .build()
            .unwrap();
        let b = ProviderInstance::from_provider("b", JsonProvider);
        let request = client
            .request(Method::Post, "https://example.test/")
            .register_instance(b.clone());

        let request = client.prepare(request).await.unwrap();

        let json = MediaType::application_json();
        let writer = request
            .message_body_workers()
            .unwrap()
            .writer_provider_for(&json)
            .unwrap();
        assert_eq!(writer.id.as_str(), "b");
        assert!(same_provider(&writer.provider, b.provider()));

        let scope = request.scope().unwrap().clone();
        drop(request);
        assert_eq!(closed.load(Ordering::SeqCst), 0);
        drop(scope);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stage_is_reusable_across_requests() {
        let config =
            Arc::new(ClientConfig::new().with_class(ProviderClass::of::<JsonProvider>("json")));
        let stage =
            ScopeInitializationStage::with_defaults(Arc::clone(&config), StageSettings::new());

        let request_for = |uri: &str| {
            ClientRequest::new(Method::Get, uri).with_configuration(Arc::clone(&config))
        };

        let first = stage.process(request_for("https://example.test/1")).await.unwrap();
        let second = stage.process(request_for("https://example.test/2")).await.unwrap();

        let (s1, s2) = (first.scope().unwrap(), second.scope().unwrap());
        assert_ne!(s1.id(), s2.id());
        assert!(!Arc::ptr_eq(
            s1.message_body_workers().unwrap(),
            s2.message_body_workers().unwrap()
        ));
        let p1 = s1.resolution().resolve_providers().unwrap();
        let p2 = s2.resolution().resolve_providers().unwrap();
        assert!(!same_provider(&p1[0].provider, &p2[0].provider));
    }

    #[tokio::test]
    async fn test_downstream_stages_see_request_services() {
        let recording = Arc::new(RecordingStage::new("recording"));
        let client = Client::builder()
            .with_class(ProviderClass::of::<JsonProvider>("json"))
            .with_instance(ProviderInstance::from_provider("not-found", StatusMapper::new("404", 404)))
            .with_instance(ProviderInstance::from_provider(
                "settings",
                StaticContextResolver::new(
                    "serializer-settings",
                    MediaType::application_json(),
                    json!({"indent": 2}),
                ),
            ))
            .with_stage(recording.clone())
            .build()
            .unwrap();

        let request = client
            .prepare(client.request(Method::Get, "https://example.test/"))
            .await
            .unwrap();

        let seen = recording.recorded();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].scope_id, Some(request.scope().unwrap().id()));
        assert!(seen[0].has_workers);

        let scope = request.scope().unwrap();
        let mapped = scope
            .exception_mappers()
            .unwrap()
            .map(&anyhow::anyhow!("upstream returned 404"))
            .unwrap();
        assert_eq!(mapped.status, 404);
        assert_eq!(
            scope
                .context_resolvers()
                .unwrap()
                .resolve("serializer-settings", &MediaType::application_json()),
            Some(json!({"indent": 2}))
        );
    }

    #[tokio::test]
    async fn test_required_contract_missing_fails_preparation() {
        let client = Client::builder()
            .with_class(ProviderClass::of::<JsonProvider>("json"))
            .with_settings(StageSettings::new().with_required_contract(ProviderContract::ExceptionMapper))
            .build()
            .unwrap();

        let err = client
            .prepare(client.request(Method::Get, "https://example.test/"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientflowError::ServiceMaterialization(ref e) if e.service == ServiceKind::ExceptionMappers
        ));

        let ok = client
            .prepare(client.request(Method::Get, "https://example.test/").register_instance(
                ProviderInstance::from_provider("catch-all", StatusMapper::new("", 500)),
            ))
            .await;
        assert!(ok.is_ok());
    }
}
