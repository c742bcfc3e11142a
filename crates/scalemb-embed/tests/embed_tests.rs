use scalemb_core::Pooling;
use scalemb_embed::{load_encoder, resolve_model_dir, FakeEncoder, TextEncoder, FAKE_DIM};

#[test]
fn fake_encoder_shapes_and_determinism() {
    // Force fake encoder to avoid loading a real model
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let encoder = load_encoder("any-model", None).expect("encoder");
    let texts = vec!["Ich bin".to_string(), "Ich bin".to_string(), "I feel".to_string()];
    let embs = encoder.embed_batch(&texts, Pooling::Mean).expect("embed_batch");
    assert_eq!(embs.len(), 3);
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), FAKE_DIM);
    assert_eq!(encoder.dim(), FAKE_DIM);

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
    assert_ne!(embs[0], embs[2]);
}

#[test]
fn fake_encoder_handles_empty_text() {
    let encoder = FakeEncoder::new(8);
    let embs = encoder.embed_batch(&[String::new()], Pooling::Cls).unwrap();
    assert_eq!(embs[0], vec![0.0; 8]);
}

#[test]
fn model_dir_resolution() {
    let tmp = tempfile::tempdir().unwrap();
    let model = tmp.path().join("all-roberta-large-v1");
    std::fs::create_dir(&model).unwrap();

    // a direct path wins
    assert_eq!(resolve_model_dir(model.to_str().unwrap(), None).unwrap(), model);
    // hub-style names resolve to their last segment under the root
    let found = resolve_model_dir("sentence-transformers/all-roberta-large-v1", Some(tmp.path())).unwrap();
    assert_eq!(found, model);
    assert!(resolve_model_dir("missing-model", Some(tmp.path())).is_err());
}
