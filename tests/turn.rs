//! Turn pipeline integration tests
//!
//! Runs full turns against in-memory collaborators

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use heartline::db::{self, ConversationRepo};
use heartline::turn::Stage;
use heartline::voice::{VoiceProfile, VoiceTier};
use heartline::{
    Collaborators, Degradation, Emotion, HistoryStore, PatternKind, TurnFailure, TurnOrchestrator,
    VoiceSelector,
};

mod common;
use common::{
    FAKE_AUDIO, FakeHistory, FakeSynthesizer, FakeTranscriber, RecordingGenerator, RecordingStore,
    create_test_user, history_of, setup_test_db,
};

const SOFT_VOICE: &str = "EXAVITQu4vr4xnSDxMaL";
const STEADY_VOICE: &str = "pNInz6obpgDQGcFmaJgB";
const AUDIO: &[u8] = b"RIFF....WAVEfmt ";

struct Harness {
    transcriber: Arc<FakeTranscriber>,
    generator: Arc<RecordingGenerator>,
    synthesizer: Arc<FakeSynthesizer>,
    store: Arc<RecordingStore>,
    orchestrator: TurnOrchestrator,
}

impl Harness {
    fn new(
        transcriber: FakeTranscriber,
        history: FakeHistory,
        generator: RecordingGenerator,
        synthesizer: FakeSynthesizer,
        store: RecordingStore,
    ) -> Self {
        let transcriber = Arc::new(transcriber);
        let generator = Arc::new(generator);
        let synthesizer = Arc::new(synthesizer);
        let store = Arc::new(store);

        let orchestrator = TurnOrchestrator::new(Collaborators {
            transcriber: transcriber.clone(),
            history: Arc::new(history),
            generator: generator.clone(),
            synthesizer: synthesizer.clone(),
            store: store.clone(),
        });

        Self {
            transcriber,
            generator,
            synthesizer,
            store,
            orchestrator,
        }
    }

    fn simple(text: &str, reply: &str) -> Self {
        Self::new(
            FakeTranscriber::text(text),
            FakeHistory::empty(),
            RecordingGenerator::replying(reply),
            FakeSynthesizer::default(),
            RecordingStore::default(),
        )
    }
}

#[tokio::test]
async fn test_happy_turn_speaks_with_soft_voice_and_persists() {
    let h = Harness::simple("I am so happy today", "That is wonderful to hear!");

    let result = h.orchestrator.run("user-1", AUDIO).await.unwrap();

    assert_eq!(result.transcription, "I am so happy today");
    assert_eq!(result.reply_text, "That is wonderful to hear!");
    assert_eq!(result.emotion.label, Emotion::Happy);
    assert!(result.emotion.valence >= 0.5);
    assert_eq!(result.language, "en");
    assert_eq!(result.voice_id.as_deref(), Some(SOFT_VOICE));
    assert_eq!(result.audio.as_deref(), Some(FAKE_AUDIO));
    assert!(result.findings.is_empty());
    assert!(!result.is_degraded());

    let prompt = h.generator.last_prompt().unwrap();
    assert!(prompt.contains("Respond in English"));
    assert!(prompt.contains("The user is happy! Celebrate with them."));

    let turns = h.store.turns.lock().unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].user_id, "user-1");
    assert_eq!(turns[0].user_message, "I am so happy today");
    assert_eq!(turns[0].assistant_message, "That is wonderful to hear!");
    assert_eq!(turns[0].emotion, Emotion::Happy);
    assert!((turns[0].emotion_score - result.emotion.valence).abs() < f64::EPSILON);
    assert_eq!(turns[0].voice_used.as_deref(), Some(SOFT_VOICE));
}

#[tokio::test]
async fn test_silent_audio_aborts_before_generation() {
    let h = Harness::new(
        FakeTranscriber::silent(),
        FakeHistory::empty(),
        RecordingGenerator::replying("unused"),
        FakeSynthesizer::default(),
        RecordingStore::default(),
    );

    let err = h.orchestrator.run("user-1", AUDIO).await.unwrap_err();

    assert_eq!(err, TurnFailure::InputError("could not transcribe"));
    assert_eq!(h.generator.calls(), 0);
    assert_eq!(h.synthesizer.calls(), 0);
    assert_eq!(h.store.count(), 0);
}

#[tokio::test]
async fn test_whitespace_transcript_is_not_a_turn() {
    let h = Harness::simple("   \n\t", "unused");

    let err = h.orchestrator.run("user-1", AUDIO).await.unwrap_err();

    assert_eq!(err, TurnFailure::InputError("could not transcribe"));
    assert_eq!(h.store.count(), 0);
}

#[tokio::test]
async fn test_empty_audio_never_reaches_transcriber() {
    let h = Harness::simple("hello", "hi");

    let err = h.orchestrator.run("user-1", &[]).await.unwrap_err();

    assert_eq!(err, TurnFailure::InputError("empty input"));
    assert_eq!(h.transcriber.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.count(), 0);
}

#[tokio::test]
async fn test_recurring_sadness_is_acknowledged_and_scolding_uses_calm_voice() {
    let h = Harness::new(
        FakeTranscriber::text("I feel sad"),
        FakeHistory::of(history_of(&[
            Emotion::Sad,
            Emotion::Neutral,
            Emotion::Sad,
            Emotion::Sad,
        ])),
        RecordingGenerator::replying(
            "I notice you have been feeling this way again. Let's take a small step together.",
        ),
        FakeSynthesizer::default(),
        RecordingStore::default(),
    );

    let result = h.orchestrator.run("user-1", AUDIO).await.unwrap();

    assert_eq!(result.emotion.label, Emotion::Sad);
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].kind, PatternKind::RepeatedEmotion);
    assert_eq!(result.findings[0].emotion, Emotion::Sad);
    assert_eq!(result.findings[0].count, 3);

    let prompt = h.generator.last_prompt().unwrap();
    assert!(prompt.contains("The user has been feeling sad frequently (3 times recently)"));
    assert!(prompt.contains("User's recent emotions: sad, sad, neutral, sad"));

    assert_eq!(result.voice_id.as_deref(), Some(STEADY_VOICE));
    assert_eq!(h.synthesizer.voices.lock().unwrap().as_slice(), [STEADY_VOICE]);
}

#[tokio::test]
async fn test_gentle_reply_to_sadness_keeps_soft_voice() {
    let h = Harness::new(
        FakeTranscriber::text("I feel sad"),
        FakeHistory::empty(),
        RecordingGenerator::replying("I'm here with you. Do you want to talk about it?"),
        FakeSynthesizer::default(),
        RecordingStore::default(),
    );

    let result = h.orchestrator.run("user-1", AUDIO).await.unwrap();

    assert_eq!(result.emotion.label, Emotion::Sad);
    assert!(result.findings.is_empty());
    assert_eq!(result.voice_id.as_deref(), Some(SOFT_VOICE));
}

#[tokio::test]
async fn test_synthesis_failure_returns_text_and_still_persists() {
    let h = Harness::new(
        FakeTranscriber::text("I am so happy today"),
        FakeHistory::empty(),
        RecordingGenerator::replying("Great news!"),
        FakeSynthesizer::failing(),
        RecordingStore::default(),
    );

    let result = h.orchestrator.run("user-1", AUDIO).await.unwrap();

    assert_eq!(result.reply_text, "Great news!");
    assert!(result.audio.is_none());
    assert_eq!(result.voice_id.as_deref(), Some(SOFT_VOICE));
    assert_eq!(result.degradations, vec![Degradation::SynthesisFailed]);
    assert_eq!(h.store.count(), 1);
}

#[tokio::test]
async fn test_transcriber_failure_is_upstream_unavailable() {
    let h = Harness::new(
        FakeTranscriber::failing(),
        FakeHistory::empty(),
        RecordingGenerator::replying("unused"),
        FakeSynthesizer::default(),
        RecordingStore::default(),
    );

    let err = h.orchestrator.run("user-1", AUDIO).await.unwrap_err();

    assert!(matches!(
        err,
        TurnFailure::UpstreamUnavailable {
            stage: Stage::Transcription,
            ..
        }
    ));
    assert_eq!(h.generator.calls(), 0);
    assert_eq!(h.store.count(), 0);
}

#[tokio::test]
async fn test_hung_transcriber_times_out() {
    let h = Harness::new(
        FakeTranscriber::hanging(),
        FakeHistory::empty(),
        RecordingGenerator::replying("unused"),
        FakeSynthesizer::default(),
        RecordingStore::default(),
    );
    let orchestrator = h
        .orchestrator
        .clone()
        .with_stage_timeout(Duration::from_millis(50));

    let err = orchestrator.run("user-1", AUDIO).await.unwrap_err();

    match err {
        TurnFailure::UpstreamUnavailable { stage, reason } => {
            assert_eq!(stage, Stage::Transcription);
            assert!(reason.contains("timed out"), "{reason}");
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert_eq!(h.store.count(), 0);
}

#[tokio::test]
async fn test_empty_generation_fails_without_persisting() {
    let h = Harness::new(
        FakeTranscriber::text("hello there"),
        FakeHistory::empty(),
        RecordingGenerator::empty(),
        FakeSynthesizer::default(),
        RecordingStore::default(),
    );

    let err = h.orchestrator.run("user-1", AUDIO).await.unwrap_err();

    assert_eq!(err, TurnFailure::GenerationFailed);
    assert_eq!(h.synthesizer.calls(), 0);
    assert_eq!(h.store.count(), 0);
}

#[tokio::test]
async fn test_blank_generation_fails() {
    let h = Harness::simple("hello there", "  \n ");

    let err = h.orchestrator.run("user-1", AUDIO).await.unwrap_err();

    assert_eq!(err, TurnFailure::GenerationFailed);
    assert_eq!(h.store.count(), 0);
}

#[tokio::test]
async fn test_generator_error_is_upstream_unavailable() {
    let h = Harness::new(
        FakeTranscriber::text("hello there"),
        FakeHistory::empty(),
        RecordingGenerator::failing(),
        FakeSynthesizer::default(),
        RecordingStore::default(),
    );

    let err = h.orchestrator.run("user-1", AUDIO).await.unwrap_err();

    assert!(matches!(
        err,
        TurnFailure::UpstreamUnavailable {
            stage: Stage::Generation,
            ..
        }
    ));
    assert_eq!(h.store.count(), 0);
}

#[tokio::test]
async fn test_history_failure_degrades_to_no_context() {
    let h = Harness::new(
        FakeTranscriber::text("I feel sad"),
        FakeHistory::failing(),
        RecordingGenerator::replying("I'm here for you."),
        FakeSynthesizer::default(),
        RecordingStore::default(),
    );

    let result = h.orchestrator.run("user-1", AUDIO).await.unwrap();

    assert!(result.findings.is_empty());
    assert_eq!(result.degradations, vec![Degradation::HistoryUnavailable]);
    assert!(!h.generator.last_prompt().unwrap().contains("recent emotions"));
    assert_eq!(h.store.count(), 1);
}

#[tokio::test]
async fn test_persistence_failure_still_returns_reply() {
    let h = Harness::new(
        FakeTranscriber::text("I am so happy today"),
        FakeHistory::empty(),
        RecordingGenerator::replying("Love that!"),
        FakeSynthesizer::default(),
        RecordingStore::failing(),
    );

    let result = h.orchestrator.run("user-1", AUDIO).await.unwrap();

    assert_eq!(result.reply_text, "Love that!");
    assert!(result.audio.is_some());
    assert_eq!(result.degradations, vec![Degradation::PersistenceFailed]);
}

#[tokio::test]
async fn test_unsupported_language_falls_back_to_english_voice() {
    let h = Harness::new(
        FakeTranscriber::with_language("bonjour", "fr-FR"),
        FakeHistory::empty(),
        RecordingGenerator::replying("Bonjour !"),
        FakeSynthesizer::default(),
        RecordingStore::default(),
    );

    let result = h.orchestrator.run("user-1", AUDIO).await.unwrap();

    assert_eq!(result.language, "fr");
    assert_eq!(
        result.degradations,
        vec![Degradation::LanguageFallback {
            language: "fr".to_string()
        }]
    );
    assert_eq!(result.voice_id.as_deref(), Some(STEADY_VOICE));
    assert!(h.generator.last_prompt().unwrap().contains("Respond in English"));
}

#[tokio::test]
async fn test_hindi_turn_uses_hindi_tier() {
    let profile = VoiceProfile {
        hindi: VoiceTier::uniform("hindi-voice"),
        ..VoiceProfile::default()
    };
    let h = Harness::new(
        FakeTranscriber::with_language("namaste", "hi"),
        FakeHistory::empty(),
        RecordingGenerator::replying("Namaste!"),
        FakeSynthesizer::default(),
        RecordingStore::default(),
    );
    let orchestrator = h.orchestrator.clone().with_selector(VoiceSelector::new(profile));

    let result = orchestrator.run("user-1", AUDIO).await.unwrap();

    assert_eq!(result.language, "hi");
    assert_eq!(result.voice_id.as_deref(), Some("hindi-voice"));
    assert!(!result.is_degraded());
    assert!(h.generator.last_prompt().unwrap().contains("Respond in Hindi"));
}

#[tokio::test]
async fn test_placeholder_voice_skips_synthesis() {
    let profile = VoiceProfile {
        english: VoiceTier::uniform("your-voice-id-here"),
        ..VoiceProfile::default()
    };
    let h = Harness::simple("I am so happy today", "Yay!");
    let orchestrator = h.orchestrator.clone().with_selector(VoiceSelector::new(profile));

    let result = orchestrator.run("user-1", AUDIO).await.unwrap();

    assert!(result.voice_id.is_none());
    assert!(result.audio.is_none());
    assert_eq!(result.degradations, vec![Degradation::NoVoice]);
    assert_eq!(h.synthesizer.calls(), 0);
    assert_eq!(h.store.turns.lock().unwrap()[0].voice_used, None);
}

#[tokio::test]
async fn test_turns_round_trip_through_sqlite() {
    let db = setup_test_db();
    let user = create_test_user(&db, "auth0|sqlite");
    let repo = Arc::new(ConversationRepo::new(db));
    let generator = Arc::new(RecordingGenerator::replying(
        "You've mentioned feeling this way again. I'm here.",
    ));

    let orchestrator = TurnOrchestrator::new(Collaborators {
        transcriber: Arc::new(FakeTranscriber::text("I feel sad")),
        history: repo.clone(),
        generator: generator.clone(),
        synthesizer: Arc::new(FakeSynthesizer::default()),
        store: repo.clone(),
    });

    for _ in 0..4 {
        let result = orchestrator.run(&user.id, AUDIO).await.unwrap();
        assert!(!result.is_degraded());
    }

    assert_eq!(repo.count(&user.id).unwrap(), 4);

    // The fourth turn saw three prior sad turns
    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("feeling sad frequently (3 times recently)"));

    let recent = repo.recent_turns(&user.id, 10).await.unwrap();
    assert_eq!(recent.len(), 4);
    assert!(recent.iter().all(|e| e.emotion == Some(Emotion::Sad)));
    assert!(recent.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let history = repo.history(&user.id, 100).unwrap();
    assert_eq!(history.len(), 4);
    assert!(history.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    assert!(
        history
            .iter()
            .all(|r| r.voice_used.as_deref() == Some(STEADY_VOICE))
    );
}

#[tokio::test]
async fn test_dropped_turn_persists_nothing() {
    let h = Harness::new(
        FakeTranscriber::text("I am so happy today"),
        FakeHistory::empty(),
        RecordingGenerator::replying("That is wonderful to hear!"),
        FakeSynthesizer::hanging(),
        RecordingStore::default(),
    );

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        h.orchestrator.run("user-1", AUDIO),
    )
    .await;

    assert!(outcome.is_err());
    // Dropped while synthesizing, after the reply was generated
    assert_eq!(h.generator.calls(), 1);
    assert_eq!(h.synthesizer.calls(), 1);
    assert_eq!(h.store.count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_turns_share_one_repository() {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::init(dir.path().join("heartline.db")).unwrap();
    let repo = Arc::new(ConversationRepo::new(pool.clone()));

    let orchestrator = TurnOrchestrator::new(Collaborators {
        transcriber: Arc::new(FakeTranscriber::text("I feel sad")),
        history: repo.clone(),
        generator: Arc::new(RecordingGenerator::replying("I'm here for you.")),
        synthesizer: Arc::new(FakeSynthesizer::default()),
        store: repo.clone(),
    });

    let users: Vec<_> = (0..4)
        .map(|n| create_test_user(&pool, &format!("auth0|parallel-{n}")).id)
        .collect();

    let mut tasks = tokio::task::JoinSet::new();
    for user_id in &users {
        for _ in 0..10 {
            let orchestrator = orchestrator.clone();
            let user_id = user_id.clone();
            tasks.spawn(async move { orchestrator.run(&user_id, AUDIO).await });
        }
    }

    while let Some(joined) = tasks.join_next().await {
        let result = joined.unwrap().unwrap();
        assert!(
            !result.degradations.contains(&Degradation::PersistenceFailed),
            "{:?}",
            result.degradations
        );
    }

    for user_id in &users {
        assert_eq!(repo.count(user_id).unwrap(), 10);
    }
}
