//! Optional AI commentary on a quake record (Gemini).
//!
//! This is an external collaborator, not part of the ingestion core: it is
//! handed a fully-populated record, invoked fire-and-forget, and never
//! blocks or fails feed processing. Every failure mode maps to one of three
//! fixed fallback strings.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{shindo_label, QuakeEvent};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_MODEL: &str = "gemini-2.0-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const FALLBACK_NO_KEY: &str = "APIキーが設定されていないため、AI解説を利用できません。";
const FALLBACK_EMPTY: &str = "AIからの応答がありませんでした。";
const FALLBACK_ERROR: &str = "AI解析中にエラーが発生しました。しばらく待ってから再試行してください。";

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl GeminiClient {
    /// A missing `GEMINI_API_KEY` is not an error; the client degrades to
    /// the fixed no-credential fallback.
    pub fn from_env(http: reqwest::Client) -> Self {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty());
        Self { http, api_key }
    }

    #[cfg(test)]
    fn without_key() -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: None,
        }
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Produce a short civil-safety commentary for one record, or a fixed
    /// fallback string. Never returns an Err.
    pub async fn summarize(&self, event: &QuakeEvent) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            return FALLBACK_NO_KEY.to_string();
        };

        match self.generate(api_key, &build_prompt(event)).await {
            Ok(Some(text)) => text,
            Ok(None) => FALLBACK_EMPTY.to_string(),
            Err(e) => {
                warn!(error = %e, "gemini request failed");
                FALLBACK_ERROR.to_string()
            }
        }
    }

    async fn generate(&self, api_key: &str, prompt: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_API_BASE, GEMINI_MODEL, api_key
        );

        let req = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let resp = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&req)
            .send()
            .await
            .context("gemini request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(400).collect();
            return Err(anyhow!("gemini {}: {}", status.as_u16(), snippet));
        }

        let parsed: GenerateContentResponse =
            resp.json().await.context("gemini json parse")?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty());

        Ok(text)
    }
}

/// Fire-and-forget: spawn the summarization off the ingest path and surface
/// the result through the log.
pub fn spawn_summary(client: Arc<GeminiClient>, event: QuakeEvent) {
    tokio::spawn(async move {
        let summary = client.summarize(&event).await;
        info!(
            event_id = %event.id,
            hypocenter = %event.earthquake.hypocenter.name,
            "AI解説:\n{}",
            summary
        );
    });
}

fn build_prompt(event: &QuakeEvent) -> String {
    let eq = &event.earthquake;
    let magnitude = if eq.hypocenter.magnitude == -1.0 {
        "不明".to_string()
    } else {
        format!("M{}", eq.hypocenter.magnitude)
    };
    let depth = if eq.hypocenter.depth == -1.0 {
        "不明".to_string()
    } else {
        format!("{}km", eq.hypocenter.depth)
    };

    format!(
        "あなたは防災と地震学の専門家です。以下の日本の地震情報をもとに、簡潔で分かりやすい一般市民向けの解説と安全アドバイスを作成してください。\n\
         \n\
         【地震情報】\n\
         - 発生時刻: {time}\n\
         - 震源地: {location}\n\
         - マグニチュード: {magnitude}\n\
         - 深さ: {depth}\n\
         - 最大震度: 震度{scale}\n\
         - 津波の有無: {tsunami}\n\
         \n\
         【出力フォーマット】\n\
         以下の構成で、HTMLタグを使わずにプレーンテキストで出力してください。Markdownは使用可能です。\n\
         \n\
         1. **概況**: 地震の規模と揺れの強さについての簡潔なまとめ。\n\
         2. **影響と注意点**: 震源の深さや規模から考えられる揺れの特徴や、余震の可能性について。\n\
         3. **防災アドバイス**: この規模の地震が発生した直後に市民が取るべき行動（津波情報に基づく避難の必要性など）。\n\
         \n\
         文字数は全体で300文字程度にまとめてください。パニックを避け、冷静な行動を促すトーンでお願いします。",
        time = eq.time,
        location = eq.hypocenter.name,
        magnitude = magnitude,
        depth = depth,
        scale = shindo_label(eq.max_scale),
        tsunami = eq.domestic_tsunami.label_ja(),
    )
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ContentOut>,
}

#[derive(Debug, Deserialize)]
struct ContentOut {
    #[serde(default)]
    parts: Vec<PartOut>,
}

#[derive(Debug, Deserialize)]
struct PartOut {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DomesticTsunami, Earthquake, Hypocenter, QuakeIssue};

    fn sample() -> QuakeEvent {
        QuakeEvent {
            id: "e1".to_string(),
            code: 551,
            time: "2024/05/20 14:32:10".to_string(),
            issue: QuakeIssue::default(),
            earthquake: Earthquake {
                time: "2024/05/20 14:30:00".to_string(),
                hypocenter: Hypocenter {
                    name: "千葉県東方沖".to_string(),
                    latitude: 35.5,
                    longitude: 140.9,
                    depth: -1.0,
                    magnitude: -1.0,
                },
                max_scale: 45,
                domestic_tsunami: DomesticTsunami::Watch,
            },
            points: Vec::new(),
        }
    }

    #[tokio::test]
    async fn missing_key_yields_fixed_fallback() {
        let client = GeminiClient::without_key();
        assert!(!client.has_key());
        assert_eq!(client.summarize(&sample()).await, FALLBACK_NO_KEY);
    }

    #[test]
    fn prompt_renders_sentinels_as_unknown() {
        let prompt = build_prompt(&sample());
        assert!(prompt.contains("マグニチュード: 不明"));
        assert!(prompt.contains("深さ: 不明"));
        assert!(prompt.contains("震度5-"));
        assert!(prompt.contains("津波注意報"));
    }

    #[test]
    fn candidate_response_decodes() {
        let json = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "概況です。" } ], "role": "model" } }
            ]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let text = parsed.candidates[0].content.as_ref().unwrap().parts[0]
            .text
            .clone();
        assert_eq!(text, "概況です。");
    }
}
