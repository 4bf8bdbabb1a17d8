//! Shared fixtures for the call-flow integration tests: scripted LLMs,
//! an in-memory vector store, and recording back-office fakes wired into
//! a real `CallRuntime`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use cp_domain::analysis::CallEndPayload;
use cp_domain::customer::CustomerProfile;
use cp_domain::error::{Error, Result};
use cp_providers::{ChatModel, ChatParams};
use cp_retrieval::{RetrievedItem, SearchEngine, SearchMode, VectorSearch};
use cp_sessions::CallSessionStore;

use cp_gateway::agents::gatekeeper::Gatekeeper;
use cp_gateway::agents::guidance::GuidanceAgent;
use cp_gateway::agents::marketing::MarketingAgent;
use cp_gateway::runtime::calls::CallRuntime;
use cp_gateway::runtime::orchestrator::AgentRegistry;
use cp_gateway::services::analysis::CallAnalyzer;
use cp_gateway::services::backoffice::{CallArchive, ProfileDirectory};
use cp_gateway::services::notifier::NotificationHub;
use cp_gateway::services::rooms::MonitorRooms;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted chat model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pops pre-scripted responses in order; an exhausted queue errors,
/// which the pipelines treat as an analysis/generation failure.
#[derive(Default)]
pub struct ScriptedChat {
    json: Mutex<VecDeque<Value>>,
    text: Mutex<VecDeque<String>>,
}

impl ScriptedChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, value: Value) {
        self.json.lock().push_back(value);
    }

    pub fn push_text(&self, text: &str) {
        self.text.lock().push_back(text.to_owned());
    }
}

#[async_trait::async_trait]
impl ChatModel for ScriptedChat {
    async fn chat_text(&self, _system: &str, _user: &str, _params: ChatParams) -> Result<String> {
        self.text
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Llm {
                model: "scripted".into(),
                message: "text script exhausted".into(),
            })
    }

    async fn chat_json(&self, _system: &str, _user: &str, _params: ChatParams) -> Result<Value> {
        self.json
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Llm {
                model: "scripted".into(),
                message: "json script exhausted".into(),
            })
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory vector store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct FakeStore {
    items: Vec<RetrievedItem>,
    searches: AtomicUsize,
}

impl FakeStore {
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl VectorSearch for FakeStore {
    async fn search(
        &self,
        _query: &str,
        _mode: SearchMode,
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<RetrievedItem>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let mut hits: Vec<RetrievedItem> = self
            .items
            .iter()
            .filter(|i| category.map(|c| i.category() == c).unwrap_or(true))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        hits.truncate(k);
        Ok(hits)
    }

    async fn sample_categories(&self, _limit: usize) -> Result<Vec<String>> {
        Ok(vec!["guideline".into(), "marketing".into(), "terms".into()])
    }
}

pub fn product(title: &str, price: i64, score: f64) -> RetrievedItem {
    RetrievedItem {
        doc_id: "raw".into(),
        score,
        content: format!("{title} 상품 설명"),
        metadata: json!({
            "source": "products",
            "title": title,
            "category": "marketing",
            "price_won": price,
        }),
    }
}

pub fn document(title: &str, category: &str, content: &str) -> RetrievedItem {
    RetrievedItem {
        doc_id: "raw".into(),
        score: 0.4,
        content: content.to_owned(),
        metadata: json!({"source": "docs", "title": title, "category": category}),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Back-office fakes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct FakeDirectory {
    pub profile: CustomerProfile,
}

#[async_trait::async_trait]
impl ProfileDirectory for FakeDirectory {
    async fn fetch_profile(&self, _phone_number: &str) -> Option<CustomerProfile> {
        Some(self.profile.clone())
    }
}

#[derive(Default)]
pub struct RecordingArchive {
    payloads: Mutex<Vec<CallEndPayload>>,
    notify: tokio::sync::Notify,
}

impl RecordingArchive {
    pub fn payload_count(&self) -> usize {
        self.payloads.lock().len()
    }

    /// Wait until at least one payload has been uploaded.
    pub async fn wait_for_payload(&self, timeout: Duration) -> Option<CallEndPayload> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(payload) = self.payloads.lock().first().cloned() {
                return Some(payload);
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }
}

#[async_trait::async_trait]
impl CallArchive for RecordingArchive {
    async fn upload(&self, payload: &CallEndPayload) {
        self.payloads.lock().push(payload.clone());
        self.notify.notify_waiters();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Harness {
    pub runtime: Arc<CallRuntime>,
    pub sessions: Arc<CallSessionStore>,
    pub rooms: Arc<MonitorRooms>,
    pub notifier: Arc<NotificationHub>,
    pub store: Arc<FakeStore>,
    pub archive: Arc<RecordingArchive>,
    pub guidance_llm: Arc<ScriptedChat>,
    pub marketing_llm: Arc<ScriptedChat>,
    pub analyzer_llm: Arc<ScriptedChat>,
}

pub fn customer_profile() -> CustomerProfile {
    CustomerProfile {
        customer_id: "C-001".into(),
        name: "김민수".into(),
        phone_number: "01012345678".into(),
        rate_plan: "5G 스탠다드".into(),
        monthly_fee_won: Some(50_000),
        remaining_months: Some(1),
        ..CustomerProfile::default()
    }
}

/// Default corpus: six products (descending relevance) plus evidence docs.
pub fn default_corpus() -> Vec<RetrievedItem> {
    vec![
        product("5G 프리미엄", 80_000, 0.95),
        product("5G 무제한 플러스", 65_000, 0.9),
        product("5G 스페셜", 60_000, 0.85),
        product("5G 라이트 플러스", 48_000, 0.8),
        product("5G 슬림", 42_000, 0.75),
        product("5G 세이브", 33_000, 0.7),
        document("위약금 약관", "terms", "위약금은 잔여 약정에 따라 산정된다."),
        document("개인정보 약관", "terms", "상담 녹취는 동의 후 보관된다."),
        document("해지방어 가이드", "guideline", "해지 문의 시 재약정 혜택을 우선 안내한다."),
    ]
}

pub fn harness_with_corpus(items: Vec<RetrievedItem>) -> Harness {
    let guidance_llm = ScriptedChat::new();
    let marketing_llm = ScriptedChat::new();
    let analyzer_llm = ScriptedChat::new();
    let fast_llm = ScriptedChat::new();

    let store = Arc::new(FakeStore {
        items,
        searches: AtomicUsize::new(0),
    });
    let search = Arc::new(SearchEngine::with_categories(
        store.clone(),
        vec!["guideline".into(), "marketing".into(), "terms".into()],
    ));

    let gatekeeper = Arc::new(Gatekeeper::new(Some(fast_llm as Arc<dyn ChatModel>)).unwrap());
    let mut registry = AgentRegistry::new();
    registry.register(Arc::new(GuidanceAgent::new(
        guidance_llm.clone(),
        search.clone(),
    )));
    registry.register(Arc::new(MarketingAgent::new(
        marketing_llm.clone(),
        search.clone(),
        gatekeeper,
    )));

    let sessions = Arc::new(CallSessionStore::new());
    let rooms = Arc::new(MonitorRooms::new());
    let notifier = Arc::new(NotificationHub::new());
    let archive = Arc::new(RecordingArchive::default());

    let runtime = Arc::new(CallRuntime {
        sessions: sessions.clone(),
        rooms: rooms.clone(),
        notifier: notifier.clone(),
        directory: Arc::new(FakeDirectory {
            profile: customer_profile(),
        }),
        archive: archive.clone(),
        agents: Arc::new(registry),
        analyzer: Arc::new(CallAnalyzer::new(analyzer_llm.clone())),
    });

    Harness {
        runtime,
        sessions,
        rooms,
        notifier,
        store,
        archive,
        guidance_llm,
        marketing_llm,
        analyzer_llm,
    }
}

pub fn harness() -> Harness {
    harness_with_corpus(default_corpus())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Frame helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Read frames until one matches `pred` (skipping others) or time out.
pub async fn recv_matching(
    rx: &mut mpsc::Receiver<Value>,
    timeout: Duration,
    pred: impl Fn(&Value) -> bool,
) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let frame = tokio::time::timeout_at(deadline, rx.recv()).await.ok()??;
        if pred(&frame) {
            return Some(frame);
        }
    }
}

pub fn is_type(frame: &Value, frame_type: &str) -> bool {
    frame.get("type").and_then(Value::as_str) == Some(frame_type)
}

/// Assert no frame matching `pred` arrives within `window`.
pub async fn assert_no_frame(
    rx: &mut mpsc::Receiver<Value>,
    window: Duration,
    pred: impl Fn(&Value) -> bool,
) {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(frame)) => {
                assert!(!pred(&frame), "unexpected frame arrived: {frame}");
            }
            Ok(None) | Err(_) => return,
        }
    }
}
