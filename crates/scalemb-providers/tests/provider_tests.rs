use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;

use scalemb_core::pipeline::{ImportPipeline, RunRequest};
use scalemb_core::{EmbedProvider, Error, ItemTable, OverwritePolicy, Pooling, ProviderConfig, ProviderKind};
use scalemb_providers::{
    AlephAlphaProvider, CohereProvider, GeckoProvider, HuggingFaceProvider, LocalProvider, MistralProvider,
    OpenAiProvider, ProviderRegistry, ProviderSettings,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn texts(items: &[&str]) -> Vec<String> { items.iter().map(|s| s.to_string()).collect() }

fn numbered(n: usize) -> Vec<String> { (0..n).map(|i| format!("t{i}")).collect() }

fn vectors_body(n: usize, key: &str) -> String {
    let rows: Vec<Vec<f32>> = (0..n).map(|i| vec![i as f32, 1.0]).collect();
    json!({ key: rows }).to_string()
}

#[test]
fn openai_embeds_each_item_in_input_order() {
    let mut server = Server::new();
    let mocks: Vec<_> = ["first", "second", "third"]
        .iter()
        .enumerate()
        .map(|(i, text)| {
            server
                .mock("POST", "/embeddings")
                .match_header("authorization", "Bearer test-key")
                .match_body(Matcher::PartialJson(json!({ "model": "text-embedding-3-small", "input": [text] })))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(json!({ "data": [{ "embedding": [i as f32], "index": 0 }] }).to_string())
                .expect(1)
                .create()
        })
        .collect();

    let provider = OpenAiProvider::new("test-key", &server.url(), TIMEOUT).unwrap().with_workers(3);
    let config = ProviderConfig::new(ProviderKind::OpenAi, "text-embedding-3-small");
    let out = provider.embed(&texts(&["first", "second", "third"]), &config).unwrap();

    assert_eq!(out, vec![vec![0.0], vec![1.0], vec![2.0]]);
    for m in mocks { m.assert(); }
}

#[test]
fn openai_folds_newlines_and_forwards_dimensions() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/embeddings")
        .match_body(Matcher::PartialJson(json!({ "input": ["I like parties. Often"], "dimensions": 2 })))
        .with_status(200)
        .with_body(r#"{"data":[{"embedding":[0.6,0.8],"index":0}]}"#)
        .create();

    let provider = OpenAiProvider::new("k", &server.url(), TIMEOUT).unwrap();
    let config = ProviderConfig::new(ProviderKind::OpenAi, "text-embedding-3-large").with_dimensions(2);
    let out = provider.embed(&texts(&["I like parties.\nOften"]), &config).unwrap();

    assert_eq!(out, vec![vec![0.6, 0.8]]);
    mock.assert();
}

#[test]
fn http_statuses_map_onto_error_kinds() {
    let cases = [
        (401, "authentication"),
        (403, "authentication"),
        (429, "rate"),
        (404, "unsupported"),
        (422, "unsupported"),
        (503, "unavailable"),
    ];
    for (status, kind) in cases {
        let mut server = Server::new();
        let _m = server.mock("POST", "/embeddings").with_status(status).with_body("nope").create();
        let provider = MistralProvider::new("k", &server.url(), TIMEOUT).unwrap();
        let err = provider
            .embed(&texts(&["x"]), &ProviderConfig::new(ProviderKind::Mistral, "mistral-embed"))
            .unwrap_err();
        let ok = match kind {
            "authentication" => matches!(err, Error::Authentication { .. }),
            "rate" => matches!(err, Error::RateLimited { .. }),
            "unsupported" => matches!(err, Error::UnsupportedConfig { .. }),
            _ => matches!(err, Error::ProviderUnavailable { .. }),
        };
        assert!(ok, "status {status} mapped to {err:?}");
    }
}

#[test]
fn unreachable_provider_is_unavailable() {
    // Nothing listens on the discard port.
    let provider = OpenAiProvider::new("k", "http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
    let err = provider
        .embed(&texts(&["x"]), &ProviderConfig::new(ProviderKind::OpenAi, "m"))
        .unwrap_err();
    assert!(matches!(err, Error::ProviderUnavailable { .. }));
}

#[test]
fn malformed_response_is_unavailable() {
    let mut server = Server::new();
    let _m = server.mock("POST", "/v1/embed").with_status(200).with_body(r#"{"unexpected":true}"#).create();
    let provider = CohereProvider::new("k", &server.url(), TIMEOUT).unwrap();
    let err = provider
        .embed(&texts(&["x"]), &ProviderConfig::new(ProviderKind::Cohere, "embed-multilingual-v3.0"))
        .unwrap_err();
    assert!(matches!(err, Error::ProviderUnavailable { .. }));
}

#[test]
fn cohere_sends_batches_of_96_with_classification_input_type() {
    let mut server = Server::new();
    let first = server
        .mock("POST", "/v1/embed")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""t95""#.to_string()),
            Matcher::PartialJson(json!({ "input_type": "classification" })),
        ]))
        .with_status(200)
        .with_body(vectors_body(96, "embeddings"))
        .expect(1)
        .create();
    let second = server
        .mock("POST", "/v1/embed")
        .match_body(Matcher::Regex(r#""texts":\["t96"\]"#.to_string()))
        .with_status(200)
        .with_body(vectors_body(1, "embeddings"))
        .expect(1)
        .create();

    let provider = CohereProvider::new("k", &server.url(), TIMEOUT).unwrap();
    let out = provider
        .embed(&numbered(97), &ProviderConfig::new(ProviderKind::Cohere, "embed-multilingual-v3.0"))
        .unwrap();

    assert_eq!(out.len(), 97);
    assert_eq!(out[95][0], 95.0);
    assert_eq!(out[96][0], 0.0);
    first.assert();
    second.assert();
}

#[test]
fn short_provider_reply_is_a_count_mismatch() {
    let mut server = Server::new();
    let _m = server.mock("POST", "/v1/embed").with_status(200).with_body(vectors_body(1, "embeddings")).create();
    let provider = CohereProvider::new("k", &server.url(), TIMEOUT).unwrap();
    let err = provider
        .embed(&texts(&["a", "b"]), &ProviderConfig::new(ProviderKind::Cohere, "embed-english-v3.0"))
        .unwrap_err();
    assert!(matches!(err, Error::VectorCountMismatch { expected: 2, actual: 1 }));
}

#[test]
fn aleph_alpha_rejects_other_sizes_before_any_request() {
    let mut server = Server::new();
    let never = server.mock("POST", "/semantic_embed").expect(0).create();
    let provider = AlephAlphaProvider::new("k", &server.url(), TIMEOUT).unwrap();
    let config = ProviderConfig::new(ProviderKind::AlephAlpha, "luminous-base").with_dimensions(256);

    let err = provider.embed(&texts(&["a"]), &config).unwrap_err();
    assert!(matches!(err, Error::UnsupportedConfig { .. }));
    never.assert();
}

#[test]
fn aleph_alpha_compresses_to_128() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/semantic_embed")
        .match_body(Matcher::PartialJson(json!({
            "prompt": "a",
            "representation": "symmetric",
            "compress_to_size": 128
        })))
        .with_status(200)
        .with_body(r#"{"model_version":"2022-04","embedding":[0.1,0.2]}"#)
        .create();
    let provider = AlephAlphaProvider::new("k", &server.url(), TIMEOUT).unwrap();
    let config = ProviderConfig::new(ProviderKind::AlephAlpha, "luminous-base").with_dimensions(128);

    assert_eq!(provider.embed(&texts(&["a"]), &config).unwrap(), vec![vec![0.1, 0.2]]);
    mock.assert();
}

#[test]
fn huggingface_accepts_nested_sentence_vector() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/models/sentence-transformers/all-MiniLM-L6-v2")
        .match_body(Matcher::Json(json!({ "inputs": "I am the life of the party." })))
        .with_status(200)
        .with_body("[[0.25, 0.5]]")
        .create();
    let provider = HuggingFaceProvider::new("k", &server.url(), TIMEOUT).unwrap();
    let config = ProviderConfig::new(ProviderKind::HuggingFace, "sentence-transformers/all-MiniLM-L6-v2");

    let out = provider.embed(&texts(&["I am the life of the party."]), &config).unwrap();
    assert_eq!(out, vec![vec![0.25, 0.5]]);
    mock.assert();
}

#[test]
fn gecko_batches_of_five_with_default_task() {
    let mut server = Server::new();
    let path = "/v1/projects/demo/locations/europe-west4/publishers/google/models/textembedding-gecko@003:predict";
    let predictions = |n: usize| {
        let p: Vec<_> = (0..n).map(|i| json!({ "embeddings": { "values": [i as f32] } })).collect();
        json!({ "predictions": p }).to_string()
    };
    let first = server
        .mock("POST", path)
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""content":"t4""#.to_string()),
            Matcher::Regex(r#""task_type":"SEMANTIC_SIMILARITY""#.to_string()),
        ]))
        .with_status(200)
        .with_body(predictions(5))
        .expect(1)
        .create();
    let second = server
        .mock("POST", path)
        .match_body(Matcher::Regex(r#""content":"t5""#.to_string()))
        .with_status(200)
        .with_body(predictions(1))
        .expect(1)
        .create();

    let provider = GeckoProvider::new("token", "demo", "europe-west4", Some(&server.url()), TIMEOUT).unwrap();
    let out = provider
        .embed(&numbered(6), &ProviderConfig::new(ProviderKind::Gecko, "textembedding-gecko@003"))
        .unwrap();

    assert_eq!(out.len(), 6);
    assert_eq!(out[4], vec![4.0]);
    assert_eq!(out[5], vec![0.0]);
    first.assert();
    second.assert();
}

#[test]
fn gecko_requires_a_project() {
    let err = GeckoProvider::new("token", " ", "us-central1", None, TIMEOUT).err();
    assert!(matches!(err, Some(Error::InvalidConfig(_))));
}

#[test]
fn local_provider_checks_layer_and_dimensions() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let provider = LocalProvider::load("paraphrase-multilingual-mpnet-base-v2", None).unwrap();
    let dim = provider.dim();
    let base = ProviderConfig::new(ProviderKind::Local, "paraphrase-multilingual-mpnet-base-v2");

    let out = provider.embed(&texts(&["a", "b"]), &base).unwrap();
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|v| v.len() == dim));

    let mut layered = base.clone();
    layered.layer = Some(3);
    assert!(matches!(provider.embed(&texts(&["a"]), &layered), Err(Error::UnsupportedConfig { .. })));

    let mut last = base.clone();
    last.layer = Some(-1);
    assert!(provider.embed(&texts(&["a"]), &last).is_ok());

    let resized = base.with_dimensions(dim + 1);
    assert!(matches!(provider.embed(&texts(&["a"]), &resized), Err(Error::UnsupportedConfig { .. })));
}

#[test]
fn registry_reports_missing_credentials() {
    std::env::remove_var("COHERE_API_KEY");
    let mut registry = ProviderRegistry::new(ProviderSettings::default());
    let err = registry
        .get(&ProviderConfig::new(ProviderKind::Cohere, "embed-multilingual-v3.0"))
        .err();
    assert!(matches!(err, Some(Error::Authentication { .. })));
}

#[test]
fn openai_run_writes_embedded_table() {
    let mut server = Server::new();
    let _m = server
        .mock("POST", "/embeddings")
        .with_status(200)
        .with_body(r#"{"data":[{"embedding":[0.5,0.5],"index":0}]}"#)
        .expect(2)
        .create();
    let dir = tempfile::tempdir().unwrap();
    let table = ItemTable::new(
        vec!["item".into(), "scaleID".into()],
        vec![vec!["x".into(), "A".into()], vec!["y".into(), "B".into()]],
    )
    .unwrap();
    let provider = OpenAiProvider::new("k", &server.url(), TIMEOUT).unwrap();
    let request = RunRequest {
        config: ProviderConfig::new(ProviderKind::OpenAi, "text-embedding-3-small"),
        destination: dir.path().join("openai.csv"),
        policy: OverwritePolicy::FailIfExists,
    };

    let report = ImportPipeline::new(&provider).run(&table, &request).unwrap();
    assert_eq!(report.rows, 2);
    assert_eq!(report.dimension, 2);
    let written = std::fs::read_to_string(dir.path().join("openai.csv")).unwrap();
    assert!(written.starts_with("item,scaleID,embedding"));
}

fn openai_data(n: usize) -> String {
    let data: Vec<_> = (0..n).map(|i| json!({ "embedding": [i as f32], "index": i })).collect();
    json!({ "data": data }).to_string()
}

#[test]
fn request_timeout_is_unavailable() {
    // accepts connections but never answers
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let provider = OpenAiProvider::new("k", &base, Duration::from_secs(1)).unwrap();

    let err = provider
        .embed(&texts(&["x"]), &ProviderConfig::new(ProviderKind::OpenAi, "m"))
        .unwrap_err();
    match err {
        Error::ProviderUnavailable { reason, .. } => assert!(reason.contains("timed out"), "{reason}"),
        other => panic!("expected ProviderUnavailable, got {other:?}"),
    }
    drop(listener);
}

#[test]
fn remote_adapters_refuse_local_model_options() {
    let mut server = Server::new();
    let never = server.mock("POST", Matcher::Any).expect(0).create();
    let url = server.url();

    let mut layered = ProviderConfig::new(ProviderKind::OpenAi, "text-embedding-3-small");
    layered.layer = Some(3);
    let openai = OpenAiProvider::new("k", &url, TIMEOUT).unwrap();
    assert!(matches!(openai.embed(&texts(&["a"]), &layered), Err(Error::UnsupportedConfig { .. })));

    let pooled = ProviderConfig::new(ProviderKind::Cohere, "embed-multilingual-v3.0").with_pooling(Pooling::Cls);
    let cohere = CohereProvider::new("k", &url, TIMEOUT).unwrap();
    assert!(matches!(cohere.embed(&texts(&["a"]), &pooled), Err(Error::UnsupportedConfig { .. })));

    let gecko = GeckoProvider::new("token", "demo", "us-central1", Some(&url), TIMEOUT).unwrap();
    let mut last = ProviderConfig::new(ProviderKind::Gecko, "textembedding-gecko@003");
    last.layer = Some(-1);
    assert!(matches!(gecko.embed(&texts(&["a"]), &last), Err(Error::UnsupportedConfig { .. })));

    never.assert();
}

#[test]
fn mistral_sends_batches_of_64() {
    let mut server = Server::new();
    let first = server
        .mock("POST", "/embeddings")
        .match_body(Matcher::Regex(r#""t63""#.to_string()))
        .with_status(200)
        .with_body(openai_data(64))
        .expect(1)
        .create();
    let second = server
        .mock("POST", "/embeddings")
        .match_body(Matcher::Regex(r#""input":\["t64"\]"#.to_string()))
        .with_status(200)
        .with_body(openai_data(1))
        .expect(1)
        .create();

    let provider = MistralProvider::new("k", &server.url(), TIMEOUT).unwrap();
    let out = provider
        .embed(&numbered(65), &ProviderConfig::new(ProviderKind::Mistral, "mistral-embed"))
        .unwrap();

    assert_eq!(out.len(), 65);
    assert_eq!(out[63], vec![63.0]);
    assert_eq!(out[64], vec![0.0]);
    first.assert();
    second.assert();
}

#[test]
fn fixed_size_providers_reject_dimensions_before_any_request() {
    let mut server = Server::new();
    let never = server.mock("POST", Matcher::Any).expect(0).create();
    let url = server.url();
    let items = texts(&["a"]);

    let mistral = MistralProvider::new("k", &url, TIMEOUT).unwrap();
    let cfg = ProviderConfig::new(ProviderKind::Mistral, "mistral-embed").with_dimensions(256);
    assert!(matches!(mistral.embed(&items, &cfg), Err(Error::UnsupportedConfig { .. })));

    let cohere = CohereProvider::new("k", &url, TIMEOUT).unwrap();
    let cfg = ProviderConfig::new(ProviderKind::Cohere, "embed-multilingual-v3.0").with_dimensions(256);
    assert!(matches!(cohere.embed(&items, &cfg), Err(Error::UnsupportedConfig { .. })));

    let hf = HuggingFaceProvider::new("k", &url, TIMEOUT).unwrap();
    let cfg = ProviderConfig::new(ProviderKind::HuggingFace, "sentence-transformers/all-MiniLM-L6-v2").with_dimensions(256);
    assert!(matches!(hf.embed(&items, &cfg), Err(Error::UnsupportedConfig { .. })));

    never.assert();
}

#[test]
fn unknown_task_is_rejected_before_any_request() {
    let mut server = Server::new();
    let never = server.mock("POST", Matcher::Any).expect(0).create();
    let url = server.url();
    let items = texts(&["a"]);

    let cohere = CohereProvider::new("k", &url, TIMEOUT).unwrap();
    let cfg = ProviderConfig::new(ProviderKind::Cohere, "embed-multilingual-v3.0").with_task("summarize");
    assert!(matches!(cohere.embed(&items, &cfg), Err(Error::UnsupportedConfig { .. })));

    let aleph = AlephAlphaProvider::new("k", &url, TIMEOUT).unwrap();
    let cfg = ProviderConfig::new(ProviderKind::AlephAlpha, "luminous-base").with_task("asymmetric");
    assert!(matches!(aleph.embed(&items, &cfg), Err(Error::UnsupportedConfig { .. })));

    never.assert();
}

#[test]
fn gecko_forwards_output_dimensionality() {
    let mut server = Server::new();
    let path = "/v1/projects/demo/locations/us-central1/publishers/google/models/text-embedding-004:predict";
    let mock = server
        .mock("POST", path)
        .match_body(Matcher::PartialJson(json!({
            "instances": [{ "content": "a", "task_type": "CLUSTERING" }],
            "parameters": { "outputDimensionality": 256 }
        })))
        .with_status(200)
        .with_body(json!({ "predictions": [{ "embeddings": { "values": [0.5] } }] }).to_string())
        .expect(1)
        .create();

    let provider = GeckoProvider::new("token", "demo", "us-central1", Some(&server.url()), TIMEOUT).unwrap();
    let cfg = ProviderConfig::new(ProviderKind::Gecko, "text-embedding-004").with_dimensions(256).with_task("CLUSTERING");
    assert_eq!(provider.embed(&texts(&["a"]), &cfg).unwrap(), vec![vec![0.5]]);
    mock.assert();
}

#[test]
fn registry_builds_local_adapter_once_per_model() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let mut registry = ProviderRegistry::new(ProviderSettings::default());
    let config = ProviderConfig::new(ProviderKind::Local, "xlm-roberta-large");

    let first = std::ptr::from_ref(registry.get(&config).unwrap()).cast::<()>();
    let second = std::ptr::from_ref(registry.get(&config).unwrap()).cast::<()>();
    assert_eq!(first, second);

    let provider = registry.get(&config).unwrap();
    assert_eq!(provider.name(), "local");
    assert_eq!(provider.embed(&texts(&["a", "b"]), &config).unwrap().len(), 2);
}

#[test]
fn local_provider_id_names_encoder_and_size() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let provider = LocalProvider::load("any-model", None).unwrap();
    assert_eq!(provider.embedder_id(), format!("local:fake:d{}", provider.dim()));
}
