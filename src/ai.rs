//! Answer service: turns a formatted question into an answer via the
//! OpenAI chat completions API.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::log;

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const MODEL: &str = "gpt-4";
const SYSTEM_PROMPT: &str = "Você é um assistente acadêmico especializado em \
explicar conceitos e responder questões de teste. Suas respostas devem ser \
claras, objetivas e educativas.";

/// The external reasoning capability the pipeline delegates to.
pub trait AnswerService {
    fn get_answer(&self, formatted_text: &str) -> Result<String>;
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

/// OpenAI-backed answer service.
pub struct OpenAiClient {
    api_key: String,
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    /// Builds a client from a configured API key.
    /// Fails up front when no key has been set.
    pub fn new(api_key: Option<&str>) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("Chave da API OpenAI não configurada"))?
            .to_string();

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self { api_key, client })
    }
}

impl AnswerService for OpenAiClient {
    fn get_answer(&self, formatted_text: &str) -> Result<String> {
        let user_prompt = format!(
            "Por favor, analise e responda a seguinte questão de teste:\n\n{}",
            formatted_text
        );

        let request = ChatRequest {
            model: MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: 0.7,
            max_tokens: 500,
        };

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| {
                log(&format!("Answer service request failed: {}", e));
                anyhow!("Não foi possível obter uma resposta da IA")
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            log(&format!("Answer service rejected credentials: HTTP {}", status));
            return Err(anyhow!(
                "Chave da API OpenAI inválida ou sem permissão. Verifique a configuração."
            ));
        }
        if !status.is_success() {
            log(&format!("Answer service error: HTTP {}", status));
            return Err(anyhow!("Não foi possível obter uma resposta da IA"));
        }

        let body: ChatResponse = response.json().map_err(|e| {
            log(&format!("Answer service returned malformed body: {}", e));
            anyhow!("Não foi possível obter uma resposta da IA")
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|answer| !answer.trim().is_empty())
            .ok_or_else(|| anyhow!("A API não retornou uma resposta válida"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_key() {
        assert!(OpenAiClient::new(None).is_err());
        assert!(OpenAiClient::new(Some("")).is_err());
        assert!(OpenAiClient::new(Some("   ")).is_err());
        assert!(OpenAiClient::new(Some("sk-test")).is_ok());
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"Paris."}}]}"#;
        let body: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            body.choices[0].message.content.as_deref(),
            Some("Paris.")
        );
    }
}
