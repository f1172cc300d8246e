//! Retrieval-augmented answering: retrieve top-k chunks, assemble a grounded
//! prompt, delegate generation to an external chat-completions service.
//!
//! The engine never returns an error to its caller. An unready index yields a
//! sentinel answer, and a failed generation call yields a diagnostic answer,
//! both with empty context, so a presentation layer can always render the
//! result directly.

use crate::embeddings::Embedder;
use crate::error::QueryError;
use crate::manager::IndexManager;
use crate::models::{Answer, GenerationOptions};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TOP_K: usize = 6;

pub const DEFAULT_COMPLETIONS_ENDPOINT: &str =
    "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_COMPLETIONS_MODEL: &str = "llama3-8b-8192";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const NOT_READY_ANSWER: &str =
    "Index not built. Add documents to the raw directory and rebuild before asking questions.";
const FALLBACK_PHRASE: &str = "I don't know";

/// External text-generation service, abstracted for testing.
pub trait CompletionClient {
    fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, QueryError>;
}

/// Blocking client for an OpenAI-compatible chat-completions endpoint.
pub struct ChatCompletionsClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl ChatCompletionsClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, QueryError> {
        Self::with_endpoint(
            DEFAULT_COMPLETIONS_ENDPOINT,
            DEFAULT_COMPLETIONS_MODEL,
            api_key,
        )
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }
}

impl CompletionClient for ChatCompletionsClient {
    fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, QueryError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()?;

        if !response.status().is_success() {
            let status = response.status().to_string();
            let details = response.text().unwrap_or_default();
            return Err(QueryError::BackendResponse { status, details });
        }

        let payload: ChatResponse = response.json()?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                QueryError::MalformedResponse("response carries no message content".into())
            })
    }
}

pub struct QueryEngine<C: CompletionClient> {
    client: C,
    options: GenerationOptions,
}

impl<C: CompletionClient> QueryEngine<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(client: C, options: GenerationOptions) -> Self {
        Self { client, options }
    }

    /// Answer `question` grounded on the `k` nearest chunks of the managed
    /// index. Infallible by contract: unready index and generation failures
    /// both come back as renderable answers with empty context.
    pub fn answer<E: Embedder>(
        &self,
        manager: &IndexManager<E>,
        question: &str,
        k: usize,
    ) -> Answer {
        let (index, chunks) = match manager.snapshot() {
            Some(snapshot) => snapshot,
            None => {
                return Answer {
                    text: NOT_READY_ANSWER.to_string(),
                    context: String::new(),
                }
            }
        };

        let query = manager.embedder().embed_query(question);
        let hits = match index.search(&query, k) {
            Ok(hits) => hits,
            Err(error) => {
                return Answer {
                    text: format!("Retrieval failed: {error}"),
                    context: String::new(),
                }
            }
        };

        // 1-based labels in retrieval order; storage indices stay internal.
        let context = hits
            .iter()
            .filter(|hit| hit.chunk_index < chunks.len())
            .enumerate()
            .map(|(n, hit)| format!("[Chunk {}]\n{}", n + 1, chunks[hit.chunk_index]))
            .collect::<Vec<_>>()
            .join("\n");

        let system_prompt = format!(
            "Answer using only the provided context. If the answer is not in \
             the context, say '{FALLBACK_PHRASE}'.\n\nContext:\n{context}"
        );

        match self.client.complete(&system_prompt, question, &self.options) {
            Ok(text) => Answer {
                text: text.trim().to_string(),
                context,
            },
            Err(error) => Answer {
                text: format!("Generation failed: {error}"),
                context: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingConfig;
    use crate::embeddings::HashedNgramEmbedder;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::tempdir;

    struct ScriptedClient {
        reply: Result<String, ()>,
        seen: RefCell<Vec<(String, String)>>,
    }

    impl ScriptedClient {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                seen: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl CompletionClient for ScriptedClient {
        fn complete(
            &self,
            system_prompt: &str,
            user_prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, QueryError> {
            self.seen
                .borrow_mut()
                .push((system_prompt.to_string(), user_prompt.to_string()));
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(()) => Err(QueryError::MalformedResponse("scripted failure".into())),
            }
        }
    }

    fn ready_manager(
        dir: &tempfile::TempDir,
        documents: &[(&str, &str)],
    ) -> IndexManager<HashedNgramEmbedder> {
        let mut manager = IndexManager::new(
            dir.path().join("raw_docs"),
            dir.path().join("processed"),
            dir.path().join("cache"),
            ChunkingConfig::default(),
            HashedNgramEmbedder::default(),
        )
        .expect("manager setup");
        for (name, body) in documents {
            fs::write(manager.raw_dir().join(name), body).expect("seed document");
        }
        manager.build_or_load(false).expect("build");
        manager
    }

    #[test]
    fn unready_manager_gets_the_sentinel_answer() {
        let dir = tempdir().expect("tempdir");
        let manager = IndexManager::new(
            dir.path().join("raw_docs"),
            dir.path().join("processed"),
            dir.path().join("cache"),
            ChunkingConfig::default(),
            HashedNgramEmbedder::default(),
        )
        .expect("manager setup");

        let engine = QueryEngine::new(ScriptedClient::replying("unused"));
        let answer = engine.answer(&manager, "anything?", DEFAULT_TOP_K);

        assert_eq!(answer.text, NOT_READY_ANSWER);
        assert!(answer.context.is_empty());
    }

    #[test]
    fn answer_carries_labeled_context_and_trimmed_text() {
        let dir = tempdir().expect("tempdir");
        let manager = ready_manager(&dir, &[("a.txt", "hello world")]);

        let engine = QueryEngine::new(ScriptedClient::replying("  A greeting.  \n"));
        let answer = engine.answer(&manager, "what is in the corpus?", DEFAULT_TOP_K);

        assert_eq!(answer.text, "A greeting.");
        assert_eq!(answer.context, "[Chunk 1]\nhello world");
    }

    #[test]
    fn system_prompt_restricts_to_context_and_names_the_fallback() {
        let dir = tempdir().expect("tempdir");
        let manager = ready_manager(&dir, &[("a.txt", "hello world")]);

        let client = ScriptedClient::replying("ok");
        let engine = QueryEngine::new(client);
        engine.answer(&manager, "what is in the corpus?", 1);

        let seen = engine.client.seen.borrow();
        let (system, user) = &seen[0];
        assert!(system.contains("only the provided context"));
        assert!(system.contains(FALLBACK_PHRASE));
        assert!(system.contains("[Chunk 1]\nhello world"));
        assert_eq!(user, "what is in the corpus?");
    }

    #[test]
    fn generation_failure_becomes_a_diagnostic_answer() {
        let dir = tempdir().expect("tempdir");
        let manager = ready_manager(&dir, &[("a.txt", "hello world")]);

        let engine = QueryEngine::new(ScriptedClient::failing());
        let answer = engine.answer(&manager, "what is in the corpus?", DEFAULT_TOP_K);

        assert!(answer.text.starts_with("Generation failed:"));
        assert!(answer.context.is_empty());
    }

    #[test]
    fn context_is_joined_in_retrieval_order() {
        let dir = tempdir().expect("tempdir");
        let manager = ready_manager(
            &dir,
            &[
                ("pumps.txt", "Centrifugal pumps move fluid with a rotating impeller."),
                ("valves.txt", "Gate valves isolate flow in pipelines."),
            ],
        );

        let engine = QueryEngine::new(ScriptedClient::replying("ok"));
        let answer = engine.answer(&manager, "how does a centrifugal pump work?", 2);

        let labels: Vec<&str> = answer
            .context
            .lines()
            .filter(|line| line.starts_with("[Chunk "))
            .collect();
        assert_eq!(labels, ["[Chunk 1]", "[Chunk 2]"]);
        assert!(answer.context.contains("impeller"));
    }
}
