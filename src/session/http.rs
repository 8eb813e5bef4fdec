//! HTTP side-channel: bulk transfers that never ride the socket.

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Progress callback: (bytes sent, total bytes).
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

#[derive(Debug, Error)]
pub enum SideChannelError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("server rejected request with status {0}")]
    Rejected(u16),
    #[error("transfer cancelled")]
    Cancelled,
}

/// Server handle for an uploaded file, referenced from later messages.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpSideChannel {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSideChannel {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        HttpSideChannel {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Multipart file upload with chunked progress reporting. Cancellation
    /// aborts the request; the server garbage-collects partial uploads.
    pub async fn upload_file(
        &self,
        session_id: &str,
        file_name: &str,
        mime: &str,
        content: Vec<u8>,
        progress: Option<ProgressFn>,
        cancel: CancellationToken,
    ) -> Result<FileRef, SideChannelError> {
        let total = content.len() as u64;
        let chunks: Vec<Vec<u8>> = content.chunks(64 * 1024).map(<[u8]>::to_vec).collect();
        let mut sent = 0u64;
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            if let Some(report) = &progress {
                report(sent, total);
            }
            Ok::<Vec<u8>, std::io::Error>(chunk)
        }));

        let part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(stream),
            total,
        )
        .file_name(file_name.to_string())
        .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let url = format!("{}/project/file?session_id={session_id}", self.endpoint);

        let request = self.client.post(url).multipart(form).send();
        tokio::select! {
            () = cancel.cancelled() => Err(SideChannelError::Cancelled),
            response = request => {
                let response = response?;
                if !response.status().is_success() {
                    return Err(SideChannelError::Rejected(response.status().as_u16()));
                }
                Ok(response.json().await?)
            }
        }
    }

    /// Transcribe recorded audio.
    pub async fn speech_to_text(
        &self,
        session_id: &str,
        audio: Vec<u8>,
        mime: &str,
    ) -> Result<String, SideChannelError> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name("audio")
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part("audio", part);
        let url = format!("{}/project/asr?session_id={session_id}", self.endpoint);
        let response = self.client.post(url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(SideChannelError::Rejected(response.status().as_u16()));
        }
        #[derive(Deserialize)]
        struct Transcript {
            text: String,
        }
        let transcript: Transcript = response.json().await?;
        Ok(transcript.text)
    }

    /// Synthesize audio for a piece of text.
    pub async fn text_to_speech(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<Vec<u8>, SideChannelError> {
        let url = format!("{}/project/tts?session_id={session_id}", self.endpoint);
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SideChannelError::Rejected(response.status().as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Record user feedback on a step.
    pub async fn send_feedback(
        &self,
        session_id: &str,
        feedback: serde_json::Value,
    ) -> Result<(), SideChannelError> {
        let url = format!("{}/feedback?session_id={session_id}", self.endpoint);
        let response = self.client.put(url).json(&feedback).send().await?;
        if !response.status().is_success() {
            return Err(SideChannelError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}
