//! Answer generation through an Ollama server.
//!
//! Uses the blocking `reqwest` client against `POST {base}/api/generate`.
//! Streaming responses arrive as newline-delimited JSON objects carrying a
//! `response` fragment and a `done` flag.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::{ModelError, ModelResult};
use crate::{GenerateOptions, TextGenerator, TokenStream};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: RequestOptions,
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    num_predict: usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Text generator backed by a local Ollama server.
#[derive(Debug)]
pub struct OllamaGenerator {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> ModelResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Http {
                url: config.base_url.clone(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn http_err(&self, url: &str, e: impl std::fmt::Display) -> ModelError {
        ModelError::Http {
            url: url.to_string(),
            message: e.to_string(),
        }
    }

    fn send(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        stream: bool,
    ) -> ModelResult<reqwest::blocking::Response> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream,
            options: RequestOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
            },
        };

        debug!(
            "POST {} (model={}, stream={}, max_tokens={}, temperature={})",
            url, self.model, stream, options.max_tokens, options.temperature
        );

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.http_err(&url, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(ModelError::generation_failed(
                &self.model,
                format!("server returned {}: {}", status, body),
            ));
        }

        Ok(resp)
    }
}

impl TextGenerator for OllamaGenerator {
    fn generate(&self, prompt: &str, options: &GenerateOptions) -> ModelResult<String> {
        let resp = self.send(prompt, options, false)?;
        let chunk: GenerateChunk = resp.json().map_err(|e| {
            ModelError::generation_failed(&self.model, format!("invalid response: {}", e))
        })?;

        if let Some(error) = chunk.error {
            return Err(ModelError::generation_failed(&self.model, error));
        }
        Ok(chunk.response)
    }

    fn generate_stream(&self, prompt: &str, options: &GenerateOptions) -> ModelResult<TokenStream> {
        let resp = self.send(prompt, options, true)?;
        Ok(Box::new(NdjsonStream {
            lines: BufReader::new(resp).lines(),
            model: self.model.clone(),
            finished: false,
        }))
    }

    fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send() {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("Ollama at {} answered {}", self.base_url, resp.status());
                false
            }
            Err(e) => {
                warn!("Ollama at {} unreachable: {}", self.base_url, e);
                false
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Iterator over the `response` fragments of an NDJSON body.
struct NdjsonStream<R: BufRead> {
    lines: std::io::Lines<R>,
    model: String,
    finished: bool,
}

impl<R: BufRead> Iterator for NdjsonStream<R> {
    type Item = ModelResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(ModelError::Io(e)));
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let chunk: GenerateChunk = match serde_json::from_str(&line) {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(ModelError::generation_failed(
                        &self.model,
                        format!("invalid stream chunk: {}", e),
                    )));
                }
            };

            if let Some(error) = chunk.error {
                self.finished = true;
                return Some(Err(ModelError::generation_failed(&self.model, error)));
            }
            self.finished = chunk.done;
            if !chunk.response.is_empty() {
                return Some(Ok(chunk.response));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(body: &str) -> NdjsonStream<Cursor<Vec<u8>>> {
        NdjsonStream {
            lines: Cursor::new(body.as_bytes().to_vec()).lines(),
            model: "llama3".to_string(),
            finished: false,
        }
    }

    #[test]
    fn test_stream_yields_fragments_until_done() {
        let body = concat!(
            "{\"response\":\"Pasal \",\"done\":false}\n",
            "\n",
            "{\"response\":\"1\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true}\n",
            "{\"response\":\"ignored\",\"done\":false}\n",
        );
        let parts: Vec<String> = stream(body).map(|r| r.unwrap()).collect();
        assert_eq!(parts, vec!["Pasal ", "1"]);
    }

    #[test]
    fn test_stream_surfaces_server_error() {
        let body = "{\"error\":\"model 'llama3' not found\"}\n";
        let mut it = stream(body);
        let err = it.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(it.next().is_none());
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            model: "llama3",
            prompt: "Pertanyaan: x",
            stream: false,
            options: RequestOptions {
                num_predict: 200,
                temperature: 0.8,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["options"]["num_predict"], 200);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_unreachable_server_is_unavailable() {
        let config = GenerationConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..GenerationConfig::default()
        };
        let generator = OllamaGenerator::new(&config).unwrap();
        assert!(!generator.is_available());
        assert!(generator
            .generate("x", &GenerateOptions::default())
            .is_err());
    }
}
