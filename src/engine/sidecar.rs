//! Bridge to the out-of-process model runner.
//!
//! The runner owns the actual diffusion pipeline. It is spawned once at
//! startup, prints a single ready line after loading weights, then serves
//! one request per line over stdin/stdout: newline-delimited JSON in both
//! directions. The channel is inherently serial, matching the one-call-at-
//! a-time contract of [`ImagePipeline`].

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::engine::pipeline::{ImagePipeline, InferenceInput, InferenceOutput};
use crate::error::{AppError, Result};
use crate::response::base64;

/// Pipeline implementation backed by a child process
#[derive(Debug)]
pub struct SidecarPipeline {
    model_id: String,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

#[derive(Serialize)]
struct RunnerRequest<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
    images: Vec<String>,
    guidance_scale: f32,
    true_cfg_scale: f32,
    num_inference_steps: u32,
    seed: u64,
}

#[derive(Deserialize)]
struct RunnerReply {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct RunnerHello {
    status: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SidecarPipeline {
    /// Spawn the runner and wait for its ready handshake. Blocking.
    pub fn spawn(config: &ModelConfig) -> Result<Self> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .arg("--model")
            .arg(&config.source)
            .arg("--device")
            .arg(&config.device)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        if let Some(hf_home) = &config.hf_home {
            command.env("HF_HOME", hf_home);
        }

        let mut child = command.spawn().map_err(|e| {
            AppError::ModelLoad(format!("failed to launch runner '{}': {}", config.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::ModelLoad("runner stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::ModelLoad("runner stdout unavailable".to_string()))?;
        let mut stdout = BufReader::new(stdout);

        // The runner loads weights before answering, so this line can take
        // minutes on a cold cache.
        let mut line = String::new();
        let hello: RunnerHello = match stdout.read_line(&mut line) {
            Ok(0) => {
                let _ = child.kill();
                return Err(AppError::ModelLoad("runner exited during startup".to_string()));
            }
            Ok(_) => serde_json::from_str(&line).map_err(|e| {
                let _ = child.kill();
                AppError::ModelLoad(format!("bad runner handshake: {}", e))
            })?,
            Err(e) => {
                let _ = child.kill();
                return Err(AppError::ModelLoad(format!("runner handshake failed: {}", e)));
            }
        };

        if hello.status != "ready" {
            let _ = child.kill();
            let detail = hello.error.unwrap_or_else(|| hello.status.clone());
            return Err(AppError::ModelLoad(detail));
        }

        Ok(Self {
            model_id: hello.model.unwrap_or_else(|| config.source.clone()),
            child,
            stdin,
            stdout,
        })
    }

    fn exchange(&mut self, request: &RunnerRequest<'_>) -> Result<RunnerReply> {
        let mut payload = serde_json::to_string(request)?;
        payload.push('\n');

        self.stdin
            .write_all(payload.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(|e| AppError::Infer(format!("runner stdin closed: {}", e)))?;

        let mut line = String::new();
        match self.stdout.read_line(&mut line) {
            Ok(0) => Err(AppError::Infer("runner exited".to_string())),
            Ok(_) => serde_json::from_str(&line)
                .map_err(|e| AppError::Infer(format!("bad runner reply: {}", e))),
            Err(e) => Err(AppError::Infer(format!("runner read failed: {}", e))),
        }
    }
}

impl ImagePipeline for SidecarPipeline {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn infer(&mut self, input: InferenceInput) -> Result<InferenceOutput> {
        let request = RunnerRequest {
            prompt: &input.prompt,
            negative_prompt: &input.negative_prompt,
            images: input.reference_images.iter().map(|i| base64::encode(i)).collect(),
            guidance_scale: input.guidance_scale,
            true_cfg_scale: input.true_cfg_scale,
            num_inference_steps: input.num_inference_steps,
            seed: input.seed,
        };

        let reply = self.exchange(&request)?;

        if let Some(message) = reply.error {
            return Err(AppError::Infer(message));
        }

        let encoded = reply
            .image
            .ok_or_else(|| AppError::Infer("runner reply carried no image".to_string()))?;
        let image = base64::decode(&encoded)
            .map_err(|e| AppError::Infer(format!("undecodable runner image: {}", e)))?;

        debug!(bytes = image.len(), "Runner produced image");

        Ok(InferenceOutput {
            image,
            seed: reply.seed.unwrap_or(input.seed),
        })
    }
}

impl Drop for SidecarPipeline {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!(error = %e, "Failed to kill model runner");
        }
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_config(script: &str) -> ModelConfig {
        ModelConfig {
            id: "test-model".to_string(),
            source: "test/source".to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            device: "cpu".to_string(),
            hf_home: None,
            tolerate_load_failure: false,
        }
    }

    #[test]
    fn test_spawn_reads_ready_handshake() {
        let config = script_config(
            r#"echo '{"status":"ready","model":"stub-model"}'; while read line; do :; done"#,
        );
        let pipeline = SidecarPipeline::spawn(&config).unwrap();
        assert_eq!(pipeline.model_id(), "stub-model");
    }

    #[test]
    fn test_spawn_fails_on_error_handshake() {
        let config =
            script_config(r#"echo '{"status":"error","error":"weights unreachable"}'"#);
        let err = SidecarPipeline::spawn(&config).unwrap_err();
        assert!(matches!(err, AppError::ModelLoad(m) if m.contains("weights unreachable")));
    }

    #[test]
    fn test_spawn_fails_when_runner_exits_silently() {
        let config = script_config("exit 3");
        let err = SidecarPipeline::spawn(&config).unwrap_err();
        assert!(matches!(err, AppError::ModelLoad(_)));
    }

    #[test]
    fn test_infer_round_trip() {
        // Echoes one canned reply per request line; "aGk=" is "hi"
        let config = script_config(
            r#"echo '{"status":"ready"}'; while read line; do echo '{"image":"aGk=","seed":42}'; done"#,
        );
        let mut pipeline = SidecarPipeline::spawn(&config).unwrap();
        let output = pipeline
            .infer(InferenceInput {
                prompt: "red circle".to_string(),
                negative_prompt: String::new(),
                reference_images: vec![],
                guidance_scale: 7.5,
                true_cfg_scale: 4.0,
                num_inference_steps: 4,
                seed: 42,
            })
            .unwrap();
        assert_eq!(output.image, b"hi");
        assert_eq!(output.seed, 42);
    }

    #[test]
    fn test_infer_surfaces_runner_error() {
        let config = script_config(
            r#"echo '{"status":"ready"}'; while read line; do echo '{"error":"oom"}'; done"#,
        );
        let mut pipeline = SidecarPipeline::spawn(&config).unwrap();
        let err = pipeline
            .infer(InferenceInput {
                prompt: "red circle".to_string(),
                negative_prompt: String::new(),
                reference_images: vec![],
                guidance_scale: 7.5,
                true_cfg_scale: 4.0,
                num_inference_steps: 4,
                seed: 1,
            })
            .unwrap_err();
        assert!(matches!(err, AppError::Infer(m) if m == "oom"));
    }
}
