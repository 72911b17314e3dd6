//! End-to-end tests for the sanitization pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use opaque::{
    AlertHandler, BreakerConfig, Engine, EngineConfig, ObfuscationMethod, HONEYTOKEN_MARKER,
};

fn hash_engine() -> Engine {
    Engine::with_defaults().unwrap()
}

// ---------------------------------------------------------------------------
// Checksum correctness boundary
// ---------------------------------------------------------------------------

#[test]
fn valid_cpf_is_replaced() {
    let engine = hash_engine();
    let out = engine.sanitize_text("O CPF do cliente é 529.982.247-25.");
    assert!(!out.contains("529.982.247-25"));
    assert!(out.contains("[HASH-"));
}

#[test]
fn invalid_cpf_is_left_byte_for_byte() {
    let engine = hash_engine();
    let input = "Erro no CPF 111.222.333-44";
    assert_eq!(engine.sanitize_text(input), input);
}

#[test]
fn mixed_valid_and_invalid_content() {
    let engine = hash_engine();
    let out = engine.sanitize_text("Valid: 529.982.247-25, Invalid: 111.222.333-44");
    assert!(out.contains("[HASH-"));
    assert!(out.contains("111.222.333-44"));
    assert!(!out.contains("529.982.247-25"));
}

#[test]
fn credit_card_and_cnpj_rules_fire() {
    let engine = hash_engine();
    let out = engine.sanitize_text("card 4242 4242 4242 4242, cnpj 11.444.777/0001-61");
    assert!(!out.contains("4242 4242 4242 4242"));
    assert!(!out.contains("11.444.777/0001-61"));
    assert_eq!(out.matches("[HASH-").count(), 2);
}

#[test]
fn pix_email_key_is_replaced() {
    let engine = hash_engine();
    let out = engine.sanitize_text("chave pix: cliente@example.com");
    assert!(!out.contains("cliente@example.com"));
    assert!(out.contains("[HASH-"));
}

#[test]
fn benign_text_passes_untouched() {
    let engine = hash_engine();
    let input = "nothing sensitive here, just numbers like 12 and 345";
    assert_eq!(engine.sanitize_text(input), input);
}

// ---------------------------------------------------------------------------
// HASH determinism / ANONYMIZE non-determinism
// ---------------------------------------------------------------------------

#[test]
fn hash_is_deterministic_across_calls_and_instances() {
    let engine1 = hash_engine();
    let engine2 = hash_engine();
    let a = engine1.sanitize_text("CPF 529.982.247-25");
    let b = engine1.sanitize_text("CPF 529.982.247-25");
    let c = engine2.sanitize_text("CPF 529.982.247-25");
    assert_eq!(a, b);
    assert_eq!(a, c);
}

#[test]
fn hash_depends_on_salt() {
    let salted = Engine::new(
        EngineConfig::builder()
            .method(ObfuscationMethod::Hash {
                salt: "pepper".into(),
            })
            .build(),
    )
    .unwrap();
    let default = hash_engine();
    assert_ne!(
        salted.sanitize_text("CPF 529.982.247-25"),
        default.sanitize_text("CPF 529.982.247-25")
    );
}

#[test]
fn anonymize_differs_on_every_call() {
    let engine = Engine::new(
        EngineConfig::builder()
            .method(ObfuscationMethod::Anonymize)
            .build(),
    )
    .unwrap();

    let mut seen = std::collections::HashSet::new();
    for _ in 0..1000 {
        let out = engine.sanitize_text("CPF 529.982.247-25");
        assert!(out.contains("[ANON-"));
        assert!(seen.insert(out), "anonymized token repeated");
    }
}

// ---------------------------------------------------------------------------
// MASK
// ---------------------------------------------------------------------------

#[test]
fn mask_preserves_last_four_characters() {
    let engine = Engine::new(
        EngineConfig::builder()
            .method(ObfuscationMethod::mask())
            .build(),
    )
    .unwrap();
    let out = engine.sanitize_text("CPF: 529.982.247-25");
    assert_eq!(out, "CPF: **********7-25");
}

// ---------------------------------------------------------------------------
// Honeytoken precedence
// ---------------------------------------------------------------------------

fn counting_alert() -> (AlertHandler, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let count2 = Arc::clone(&count);
    let handler: AlertHandler = Arc::new(move |_, _| {
        count2.fetch_add(1, Ordering::SeqCst);
    });
    (handler, count)
}

#[test]
fn honeytoken_beats_validation_and_alerts_once() {
    let (handler, count) = counting_alert();
    let engine = Engine::new(
        EngineConfig::builder()
            .honeytoken("999.888.777-66")
            .alert(handler)
            .build(),
    )
    .unwrap();

    let out = engine.sanitize_text("CPF 999.888.777-66");
    assert!(out.contains(HONEYTOKEN_MARKER));
    assert!(!out.contains("999.888.777-66"));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn unformatted_honeytoken_variant_still_triggers() {
    // The bait is configured formatted; the log carries it bare. The span
    // check compares digit-normalized forms.
    let (handler, count) = counting_alert();
    let engine = Engine::new(
        EngineConfig::builder()
            .honeytoken("999.888.777-66")
            .alert(handler)
            .build(),
    )
    .unwrap();

    let out = engine.sanitize_text("tentativa com 99988877766");
    assert!(out.contains(HONEYTOKEN_MARKER));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn non_bait_values_do_not_alert() {
    let (handler, count) = counting_alert();
    let engine = Engine::new(
        EngineConfig::builder()
            .honeytoken("999.888.777-66")
            .alert(handler)
            .build(),
    )
    .unwrap();

    let out = engine.sanitize_text("CPF 529.982.247-25");
    assert!(out.contains("[HASH-"));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn panicking_alert_handler_never_breaks_sanitization() {
    let handler: AlertHandler = Arc::new(|_, _| panic!("siem unreachable"));
    let engine = Engine::new(
        EngineConfig::builder()
            .honeytoken("bait-value")
            .alert(handler)
            .build(),
    )
    .unwrap();
    let out = engine.sanitize_text("found bait-value in request");
    assert!(out.contains(HONEYTOKEN_MARKER));
}

#[test]
fn default_alert_sink_is_the_security_log() {
    // Without an injected handler, detection is reported through tracing;
    // sanitization must still complete and splice the marker.
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::ERROR)
        .try_init();
    let engine = Engine::new(EngineConfig::builder().honeytoken("bait-value").build()).unwrap();
    let out = engine.sanitize_text("request carried bait-value");
    assert!(out.contains(HONEYTOKEN_MARKER));
}

#[test]
fn alert_context_names_the_source_field() {
    let fields: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let fields2 = Arc::clone(&fields);
    let handler: AlertHandler = Arc::new(move |_, ctx| {
        fields2
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ctx.field.clone());
    });
    let engine = Engine::new(
        EngineConfig::builder()
            .honeytoken("999.888.777-66")
            .alert(handler)
            .build(),
    )
    .unwrap();

    engine.sanitize(&json!({ "user": { "cpf": "999.888.777-66" } }));
    assert_eq!(
        fields.lock().unwrap_or_else(|e| e.into_inner()).as_slice(),
        &[Some("cpf".to_string())]
    );
}

// ---------------------------------------------------------------------------
// Circuit breaker
// ---------------------------------------------------------------------------

fn breaker_engine(threshold: u64, window: Duration) -> Engine {
    Engine::new(
        EngineConfig::builder()
            .breaker(BreakerConfig { threshold, window })
            .build(),
    )
    .unwrap()
}

#[test]
fn breaker_opens_after_threshold_matches() {
    let engine = breaker_engine(3, Duration::from_secs(60));
    for _ in 0..3 {
        let out = engine.sanitize_text("CPF 529.982.247-25");
        assert!(out.contains("[HASH-"));
    }
    // Fourth candidate in the same window: passed through even though it
    // would validate.
    let input = "CPF 529.982.247-25";
    assert_eq!(engine.sanitize_text(input), input);
}

#[test]
fn breaker_counts_every_match_inside_one_string() {
    let engine = breaker_engine(3, Duration::from_secs(60));
    let flood = "529.982.247-25 529.982.247-25 529.982.247-25 529.982.247-25";
    // The current string is finished (all four replaced)...
    let out = engine.sanitize_text(flood);
    assert_eq!(out.matches("[HASH-").count(), 4);
    // ...but subsequent strings in the window pass through.
    let input = "CPF 529.982.247-25";
    assert_eq!(engine.sanitize_text(input), input);
}

#[test]
fn breaker_closes_when_window_elapses() {
    let engine = breaker_engine(1, Duration::from_millis(50));
    assert!(engine.sanitize_text("CPF 529.982.247-25").contains("[HASH-"));
    let input = "CPF 529.982.247-25";
    assert_eq!(engine.sanitize_text(input), input);

    std::thread::sleep(Duration::from_millis(60));
    assert!(engine.sanitize_text("CPF 529.982.247-25").contains("[HASH-"));
}

#[test]
fn honeytokens_trigger_even_while_breaker_is_open() {
    let (handler, count) = counting_alert();
    let engine = Engine::new(
        EngineConfig::builder()
            .honeytoken("bait-value")
            .alert(handler)
            .breaker(BreakerConfig {
                threshold: 1,
                window: Duration::from_secs(60),
            })
            .build(),
    )
    .unwrap();

    engine.sanitize_text("CPF 529.982.247-25"); // opens the breaker
    let out = engine.sanitize_text("leaking bait-value now");
    assert!(out.contains(HONEYTOKEN_MARKER));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Idempotence over already-sanitized text
// ---------------------------------------------------------------------------

#[test]
fn sanitized_output_is_a_fixed_point() {
    let engine = hash_engine();
    let once = engine.sanitize_text("CPF 529.982.247-25 and card 4242 4242 4242 4242");
    let twice = engine.sanitize_text(&once);
    assert_eq!(once, twice);
}

#[test]
fn masked_output_is_a_fixed_point() {
    let engine = Engine::new(
        EngineConfig::builder()
            .method(ObfuscationMethod::mask())
            .build(),
    )
    .unwrap();
    let once = engine.sanitize_text("CPF 529.982.247-25");
    assert_eq!(engine.sanitize_text(&once), once);
}

#[test]
fn vault_output_is_a_fixed_point() {
    let engine = Engine::new(
        EngineConfig::builder()
            .method(ObfuscationMethod::Vault {
                passphrase: "master".into(),
            })
            .build(),
    )
    .unwrap();
    let once = engine.sanitize_text("CPF 529.982.247-25");
    assert!(once.contains("[VAULT:"));
    assert_eq!(engine.sanitize_text(&once), once);
}

// ---------------------------------------------------------------------------
// Structural recursion
// ---------------------------------------------------------------------------

#[test]
fn mapping_leaves_are_sanitized_in_place() {
    let engine = hash_engine();
    let payload = json!({ "note": "CPF 529.982.247-25", "count": 3 });
    let out = engine.sanitize(&payload);

    assert_eq!(out["count"], 3);
    let note = out["note"].as_str().unwrap();
    assert!(note.contains("[HASH-"));
    assert!(!note.contains("529.982.247-25"));

    // The input payload itself is untouched.
    assert_eq!(payload["note"], "CPF 529.982.247-25");
}

#[test]
fn nested_structures_recurse() {
    let engine = hash_engine();
    let payload = json!({
        "user": { "cpf": "529.982.247-25", "id": 123 },
        "list": ["529.982.247-25", "safe", true, null],
    });
    let out = engine.sanitize(&payload);

    assert!(out["user"]["cpf"].as_str().unwrap().contains("[HASH-"));
    assert_eq!(out["user"]["id"], 123);
    assert!(out["list"][0].as_str().unwrap().contains("[HASH-"));
    assert_eq!(out["list"][1], "safe");
    assert_eq!(out["list"][2], true);
    assert_eq!(out["list"][3], serde_json::Value::Null);
}

#[test]
fn keys_are_never_rewritten() {
    // A key that is itself a valid CPF stays a key, untouched.
    let engine = hash_engine();
    let payload = json!({ "529.982.247-25": "value with CPF 529.982.247-25" });
    let out = engine.sanitize(&payload);

    let obj = out.as_object().unwrap();
    assert!(obj.contains_key("529.982.247-25"));
    assert!(obj["529.982.247-25"].as_str().unwrap().contains("[HASH-"));
}

// ---------------------------------------------------------------------------
// Reconfiguration
// ---------------------------------------------------------------------------

#[test]
fn reconfigure_replaces_the_whole_setup() {
    let engine = hash_engine();
    assert!(engine
        .sanitize_text("CPF 529.982.247-25")
        .contains("[HASH-"));

    engine
        .reconfigure(
            EngineConfig::builder()
                .method(ObfuscationMethod::Pseudonymize {
                    secret: "rotated".into(),
                })
                .build(),
        )
        .unwrap();
    assert!(engine
        .sanitize_text("CPF 529.982.247-25")
        .contains("[PSEUDO-"));
}

#[test]
fn failed_reconfigure_keeps_previous_state() {
    let engine = hash_engine();
    let err = engine.reconfigure(
        EngineConfig::builder()
            .method(ObfuscationMethod::Vault {
                passphrase: String::new(),
            })
            .build(),
    );
    assert!(err.is_err());
    // Old configuration still active.
    assert!(engine
        .sanitize_text("CPF 529.982.247-25")
        .contains("[HASH-"));
}

// ---------------------------------------------------------------------------
// Pseudonymization
// ---------------------------------------------------------------------------

#[test]
fn pseudonymize_is_deterministic_under_one_secret() {
    let engine = Engine::new(
        EngineConfig::builder()
            .method(ObfuscationMethod::Pseudonymize {
                secret: "test-key".into(),
            })
            .build(),
    )
    .unwrap();
    let a = engine.sanitize_text("CPF 529.982.247-25");
    let b = engine.sanitize_text("CPF 529.982.247-25");
    assert!(a.contains("[PSEUDO-"));
    assert_eq!(a, b);
}

#[test]
fn formatted_and_bare_values_pseudonymize_identically() {
    // Normalization strips punctuation before the keyed transform, so the
    // same identifier correlates across formatting variants.
    let engine = Engine::new(
        EngineConfig::builder()
            .method(ObfuscationMethod::Pseudonymize {
                secret: "test-key".into(),
            })
            .build(),
    )
    .unwrap();
    let formatted = engine.sanitize_text("529.982.247-25");
    let bare = engine.sanitize_text("52998224725");
    assert_eq!(formatted, bare);
}
