use super::{GenerationError, GenerationRequest, TextGenerator};
use serde_json::{json, Value};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You summarize documents from a company file store. Reply with a concise plain-text summary of the document's purpose and key contents.";

/// Runs `call` on a worker thread and waits at most `deadline` for it.
///
/// Whichever finishes first wins: a late result is discarded and reported as
/// [`GenerationError::Timeout`], never as a partial success. The losing worker is joined before
/// returning, so at most one call is ever in flight.
pub fn call_with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, GenerationError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, GenerationError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker = thread::Builder::new()
        .name("generation-call".to_string())
        .spawn(move || {
            let _ = tx.send(call());
        })
        .map_err(|err| GenerationError::Transport(format!("failed to spawn call: {err}")))?;

    let outcome = match rx.recv_timeout(deadline) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(GenerationError::Timeout {
            timeout_ms: deadline.as_millis() as u64,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(GenerationError::Transport(
            "generation call exited without a result".to_string(),
        )),
    };
    let _ = worker.join();
    outcome
}

pub fn build_prompt(request: &GenerationRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("File: {}\n", request.display_name));
    if !request.directory_path.trim().is_empty() {
        prompt.push_str(&format!("Folder: {}\n", request.directory_path));
    }
    prompt.push_str("Content:\n");
    prompt.push_str(request.text.trim());
    prompt
}

/// OpenAI-compatible `chat/completions` client.
#[derive(Debug, Clone)]
pub struct ChatCompletionsGenerator {
    api_base: String,
    api_key: String,
    model: String,
    agent: ureq::Agent,
}

impl ChatCompletionsGenerator {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        transport_timeout: Duration,
    ) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(transport_timeout).build();
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
            agent,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

impl TextGenerator for ChatCompletionsGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(request) }
            ],
            "temperature": 0.3
        });

        let response = self
            .agent
            .post(&self.endpoint())
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(body);

        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let text = response.into_string().unwrap_or_default();
                let message = extract_error_message(status, &text);
                return Err(if status == 429 {
                    GenerationError::RateLimited { message }
                } else {
                    GenerationError::Http { status, message }
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(GenerationError::Transport(transport.to_string()))
            }
        };

        let text = response
            .into_string()
            .map_err(|err| GenerationError::Transport(err.to_string()))?;
        parse_completion(&text)
    }
}

pub fn parse_completion(body: &str) -> Result<String, GenerationError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| GenerationError::InvalidResponse(format!("invalid json: {err}")))?;
    let content = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            GenerationError::InvalidResponse(
                "missing choices[0].message.content".to_string(),
            )
        })?;
    let content = content.trim();
    if content.is_empty() {
        return Err(GenerationError::InvalidResponse(
            "empty completion".to_string(),
        ));
    }
    Ok(content.to_string())
}

fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
        {
            return format!("HTTP {status}: {msg}");
        }
        if let Some(msg) = v.get("message").and_then(Value::as_str) {
            return format!("HTTP {status}: {msg}");
        }
    }

    let trimmed = body.trim();
    let snippet: String = trimmed.chars().take(400).collect();
    if snippet.len() < trimmed.len() {
        format!("HTTP {status}: {snippet}...")
    } else {
        format!("HTTP {status}: {snippet}")
    }
}
