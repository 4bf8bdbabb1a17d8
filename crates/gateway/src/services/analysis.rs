//! End-of-call analysis.
//!
//! One structured-output LLM call over the full transcript, producing the
//! summary/score record that gets posted to the call archive together
//! with the transcript and timing metrics.

use std::sync::Arc;

use chrono::Utc;

use cp_domain::analysis::{billsec_for, CallAnalysis, CallEndPayload};
use cp_domain::error::Result;
use cp_domain::turn::TurnRecord;
use cp_providers::{chat_structured, ChatModel, ChatParams};
use cp_sessions::CallSession;

use crate::services::backoffice::CallArchive;

const ANALYSIS_SYSTEM: &str = "당신은 숙련된 CS 품질 관리자입니다. \
제공된 상담 스크립트를 분석하여 다음 항목들을 추출/평가해 주세요.\n\
\n\
1. summary_text: 상담의 핵심 내용을 명확하게 요약\n\
2. estimated_cost: 상담 내용을 바탕으로 예상되는 비용(상품 가입 등)이 있다면 원 단위로 추정 (없으면 0)\n\
3. ces_score: 고객이 문제를 해결하기 위해 얼마나 많은 노력을 들였는지 0~10점 (낮을수록 좋음)\n\
4. csat_score: 고객의 만족도를 0~100점으로 평가\n\
5. rps_score: 고객이 서비스를 추천할 의향을 0~10점으로 평가\n\
6. keyword: 핵심 단어 리스트\n\
7. violence_count: 고객의 발화 중 비속어/욕설/인신공격이 포함된 횟수\n\
\n\
출력은 위 키를 가진 JSON 단일 객체만 허용한다.";

pub struct CallAnalyzer {
    llm: Arc<dyn ChatModel>,
}

impl CallAnalyzer {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    /// Analyze a finished call's transcript.
    pub async fn analyze(&self, history: &[TurnRecord]) -> Result<CallAnalysis> {
        if history.is_empty() {
            return Ok(CallAnalysis::default());
        }
        let transcript = history
            .iter()
            .map(|t| format!("{}: {}", t.speaker.label(), t.transcript))
            .collect::<Vec<_>>()
            .join("\n");

        chat_structured::<CallAnalysis>(
            self.llm.as_ref(),
            ANALYSIS_SYSTEM,
            &transcript,
            ChatParams::temperature(0.0),
        )
        .await
    }

    /// Assemble the archive payload from the analysis and the session
    /// snapshot taken at call end.
    pub fn build_payload(analysis: CallAnalysis, session: &CallSession) -> CallEndPayload {
        let end_time = session.end_time.unwrap_or_else(Utc::now);
        let duration = session
            .start_time
            .map(|start| (end_time - start).num_seconds().max(0))
            .unwrap_or(0);

        CallEndPayload {
            transcripts: session.history.clone(),
            summary_text: analysis.summary_text,
            estimated_cost: analysis.estimated_cost,
            ces_score: analysis.ces_score,
            csat_score: analysis.csat_score,
            rps_score: analysis.rps_score,
            keyword: analysis.keyword,
            violence_count: analysis.violence_count,
            customer_number: session
                .customer_info
                .as_ref()
                .map(|p| p.phone_number.clone())
                .filter(|p| !p.is_empty()),
            member_id: session.operator.as_ref().map(|o| o.member_id),
            tenant_name: session.operator.as_ref().map(|o| o.tenant_name.clone()),
            start_time: session.start_time,
            end_time,
            duration,
            billsec: billsec_for(duration),
        }
    }

    /// Full end-of-call pass: analyze, assemble, upload. Every failure
    /// is logged and dropped; the call has already ended and nothing
    /// downstream can retry meaningfully here.
    pub async fn run(&self, session: CallSession, archive: &dyn CallArchive) {
        if session.history.is_empty() {
            tracing::info!(call_id = %session.call_id, "no history, skipping analysis");
            return;
        }
        tracing::info!(
            call_id = %session.call_id,
            turns = session.history.len(),
            "running end-of-call analysis"
        );

        let analysis = match self.analyze(&session.history).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::error!(call_id = %session.call_id, error = %e, "analysis failed");
                return;
            }
        };

        let payload = Self::build_payload(analysis, &session);
        archive.upload(&payload).await;
    }
}
