//! A concrete [`ImageSolver`] backed by a hosted image-to-text solving
//! service, so the CLI has something real to plug into the pipeline.
//!
//! Ported near-verbatim from the teacher's `captcha::solver::CaptchaSolver`
//! (same create-task / poll-get-result shape against the 2Captcha API) but
//! swapped from `RecaptchaV2/V3TaskProxyless` to `ImageToTextTask`, since
//! this engine solves plain character-image CAPTCHAs, not reCAPTCHA.

use std::time::{Duration, Instant};

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::types::{CaptchaError, CaptchaImage, ImageSolver};

const TWOCAPTCHA_API: &str = "https://api.2captcha.com";

pub struct TwoCaptchaImageSolver {
    api_key: String,
    client: Client,
    poll_interval: Duration,
    max_solve_time: Duration,
}

impl TwoCaptchaImageSolver {
    pub fn new(api_key: String) -> Result<Self, CaptchaError> {
        if api_key.is_empty() {
            return Err(CaptchaError::ApiError("API key not configured".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CaptchaError::NetworkError(e.to_string()))?;

        Ok(Self {
            api_key,
            client,
            poll_interval: Duration::from_secs(5),
            max_solve_time: Duration::from_secs(120),
        })
    }

    async fn create_task(&self, image: &CaptchaImage) -> Result<i64, CaptchaError> {
        let body = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        let request = CreateTaskRequest {
            client_key: self.api_key.clone(),
            task: ImageToTextTask {
                task_type: "ImageToTextTask",
                body,
                numeric: 0,
                min_length: image.expected_length,
                max_length: image.expected_length,
            },
        };

        let response = self
            .client
            .post(format!("{TWOCAPTCHA_API}/createTask"))
            .json(&request)
            .send()
            .await
            .map_err(|e| CaptchaError::NetworkError(e.to_string()))?;

        let result: CreateTaskResponse = response
            .json()
            .await
            .map_err(|e| CaptchaError::InvalidResponse(e.to_string()))?;

        if result.error_id != 0 {
            return Err(CaptchaError::TaskCreationFailed(
                result.error_description.unwrap_or_else(|| format!("errorId={}", result.error_id)),
            ));
        }
        let task_id = result.task_id.ok_or_else(|| CaptchaError::InvalidResponse("no task ID in response".into()))?;
        debug!(task_id, "2captcha ImageToTextTask created");
        Ok(task_id)
    }

    async fn get_result(&self, task_id: i64) -> Result<Option<String>, CaptchaError> {
        let request = GetResultRequest { client_key: self.api_key.clone(), task_id };

        let response = self
            .client
            .post(format!("{TWOCAPTCHA_API}/getTaskResult"))
            .json(&request)
            .send()
            .await
            .map_err(|e| CaptchaError::NetworkError(e.to_string()))?;

        let result: GetResultResponse = response
            .json()
            .await
            .map_err(|e| CaptchaError::InvalidResponse(e.to_string()))?;

        if result.error_id != 0 {
            return Err(CaptchaError::ApiError(
                result.error_description.unwrap_or_else(|| format!("errorId={}", result.error_id)),
            ));
        }

        if result.status.as_deref() == Some("ready") {
            return Ok(result.solution.and_then(|s| s.text));
        }
        Ok(None)
    }
}

#[async_trait::async_trait]
impl ImageSolver for TwoCaptchaImageSolver {
    async fn solve(&self, image: &CaptchaImage) -> Result<String, CaptchaError> {
        let start = Instant::now();
        let task_id = self.create_task(image).await?;
        let deadline = start + self.max_solve_time;

        loop {
            if Instant::now() > deadline {
                return Err(CaptchaError::Timeout(self.max_solve_time.as_secs()));
            }
            tokio::time::sleep(self.poll_interval).await;

            if let Some(text) = self.get_result(task_id).await? {
                info!(ms = start.elapsed().as_millis() as u64, "hosted solver produced an answer");
                return Ok(text);
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateTaskRequest {
    #[serde(rename = "clientKey")]
    client_key: String,
    task: ImageToTextTask,
}

#[derive(Debug, Serialize)]
struct ImageToTextTask {
    #[serde(rename = "type")]
    task_type: &'static str,
    body: String,
    numeric: u8,
    #[serde(rename = "minLength")]
    min_length: u32,
    #[serde(rename = "maxLength")]
    max_length: u32,
}

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    #[serde(rename = "errorId")]
    error_id: i32,
    #[serde(rename = "errorDescription")]
    error_description: Option<String>,
    #[serde(rename = "taskId")]
    task_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct GetResultRequest {
    #[serde(rename = "clientKey")]
    client_key: String,
    #[serde(rename = "taskId")]
    task_id: i64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GetResultResponse {
    #[serde(rename = "errorId")]
    error_id: i32,
    #[serde(rename = "errorDescription")]
    error_description: Option<String>,
    status: Option<String>,
    solution: Option<Solution>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Solution {
    text: Option<String>,
}
