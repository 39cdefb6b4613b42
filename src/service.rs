// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! User-facing operations: generate, list videos, list models, select a
//! model, play a stored video.
//!
//! Each operation talks to the requester through short text replies and
//! returns a typed result. Errors are returned, not replied; the caller
//! decides how to render them (see [`VidrunError::explain`]).

use std::path::{Path, PathBuf};

use crate::catalog::{CatalogEntry, VideoCatalog};
use crate::client::RemoteJobClient;
use crate::config::{config_path, Config};
use crate::delivery::{reply, DeliveryDispatcher, DeliveryOutcome, DeliveryRequest, Requester};
use crate::download::DownloadManager;
use crate::error::VidrunError;
use crate::types::{model_by_index, JobHandle, ResultLocator, SUPPORTED_MODELS};

/// Result of a successful generate call.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub handle: JobHandle,
    pub locator: ResultLocator,
    /// Catalog entry, if the video was downloaded
    pub video: Option<CatalogEntry>,
    pub delivery: DeliveryOutcome,
}

/// The pipeline plus the commands around it.
pub struct VideoService {
    config: Config,
    /// Where `select_model` persists; `None` means the default path
    config_path: Option<PathBuf>,
    dispatcher: DeliveryDispatcher,
    downloader: DownloadManager,
}

impl VideoService {
    pub fn new(config: Config) -> Result<Self, VidrunError> {
        let dispatcher = DeliveryDispatcher::standard(&config.gateway);
        let downloader =
            DownloadManager::new().map_err(|e| VidrunError::Download(e.to_string()))?;
        Ok(Self {
            config,
            config_path: None,
            dispatcher,
            downloader,
        })
    }

    /// Persist model selection to `path` instead of `~/.vidrun/config.json`.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: DeliveryDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_downloader(mut self, downloader: DownloadManager) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the catalog on the blocking pool; it takes file locks.
    async fn open_catalog(&self) -> Result<VideoCatalog, VidrunError> {
        let dir = self
            .config
            .storage_dir()
            .map_err(|e| VidrunError::Storage(format!("{:#}", e)))?;
        tokio::task::spawn_blocking(move || VideoCatalog::open(&dir))
            .await
            .map_err(|e| VidrunError::Storage(format!("Task join error: {}", e)))?
            .map_err(|e| VidrunError::Storage(format!("{:#}", e)))
    }

    /// Submit, poll, download and deliver one video.
    pub async fn generate(
        &self,
        prompt: &str,
        model_override: Option<&str>,
        requester: &dyn Requester,
    ) -> Result<GenerationOutcome, VidrunError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(VidrunError::MissingPrompt);
        }

        let report = self.config.validate();
        if !report.is_valid() {
            return Err(VidrunError::Config(report.errors));
        }
        if self.config.api_key().is_empty() {
            return Err(VidrunError::Config(vec![
                "API key is not configured".to_string()
            ]));
        }

        let request = self.config.job_request(prompt, model_override);
        reply(requester, "Generating video, this can take a few minutes...").await;
        reply(requester, &format!("Model: {}", request.model)).await;

        let client = RemoteJobClient::for_request(&request)
            .map_err(|e| VidrunError::Submission(e.to_string()))?;
        let handle = client
            .submit(&request)
            .await
            .map_err(|e| VidrunError::Submission(e.to_string()))?;
        reply(requester, &format!("Task created: {}", handle)).await;

        let locator = client
            .poll(&handle, self.config.max_wait(), self.config.poll_interval())
            .await
            .map_err(|e| VidrunError::Generation(e.to_string()))?;
        let link_text = format!("Video generated! Download link: {}", locator);

        if !self.config.settings.auto_download {
            let delivery = self
                .dispatcher
                .deliver(&DeliveryRequest::text_only(&link_text), requester)
                .await;
            return Ok(GenerationOutcome {
                handle,
                locator,
                video: None,
                delivery,
            });
        }

        reply(requester, "Downloading video...").await;
        let downloaded = match self.open_catalog().await {
            Ok(mut catalog) => self
                .downloader
                .fetch(&mut catalog, &locator, &request.prompt, &request.model)
                .await
                .map_err(|e| VidrunError::Download(e.to_string())),
            Err(e) => Err(e),
        };

        let video = match downloaded {
            Ok(video) => video,
            Err(e) => {
                tracing::error!("{}; falling back to the link", e);
                reply(requester, &format!("{}, sending the link instead", e)).await;
                let delivery = self
                    .dispatcher
                    .deliver(&DeliveryRequest::text_only(&link_text), requester)
                    .await;
                return Ok(GenerationOutcome {
                    handle,
                    locator,
                    video: None,
                    delivery,
                });
            }
        };

        reply(requester, "Sending video...").await;
        let delivery = self
            .dispatcher
            .deliver(&DeliveryRequest::file(&video.path, &link_text), requester)
            .await;
        if delivery.delivered_file() {
            reply(requester, "Video sent successfully!").await;
        }

        if !self.config.settings.keep_video_files {
            remove_artifact(&video.path);
        }

        Ok(GenerationOutcome {
            handle,
            locator,
            video: Some(video.entry),
            delivery,
        })
    }

    /// Stored videos, newest first.
    pub async fn list_videos(&self, requester: &dyn Requester) -> Result<Vec<CatalogEntry>, VidrunError> {
        let catalog = self.open_catalog().await?;
        let entries: Vec<CatalogEntry> = catalog.list_all().into_iter().cloned().collect();

        if entries.is_empty() {
            reply(requester, "No videos generated yet").await;
        } else {
            reply(requester, &format_video_list(&entries)).await;
        }
        Ok(entries)
    }

    /// Supported models, numbered from 1.
    pub async fn list_models(&self, requester: &dyn Requester) -> &'static [&'static str] {
        reply(requester, &format_model_list(&self.config.api.model_id)).await;
        SUPPORTED_MODELS
    }

    /// Make the model at 1-based `input` the default and save the config.
    ///
    /// A failed save is reported with manual instructions, not as an error.
    pub async fn select_model(
        &mut self,
        input: &str,
        requester: &dyn Requester,
    ) -> Result<&'static str, VidrunError> {
        let input = input.trim();
        let model = input
            .parse::<usize>()
            .ok()
            .and_then(model_by_index)
            .ok_or_else(|| VidrunError::InvalidModelIndex {
                input: input.to_string(),
                max: SUPPORTED_MODELS.len(),
            })?;

        self.config.api.model_id = model.to_string();
        reply(requester, &format!("Model selected: {}", model)).await;

        let saved = match &self.config_path {
            Some(path) => self.config.save_to(path).map(|_| path.clone()),
            None => config_path().and_then(|path| self.config.save_to(&path).map(|_| path)),
        };

        match saved {
            Ok(path) => {
                tracing::info!("Default model set to {} in {:?}", model, path);
                reply(requester, "Configuration updated").await;
            }
            Err(e) => {
                tracing::error!("Failed to save config: {:#}", e);
                reply(
                    requester,
                    &format!(
                        "Automatic config update failed, set api.model_id to {} in ~/.vidrun/config.json manually",
                        model
                    ),
                )
                .await;
            }
        }

        Ok(model)
    }

    /// Deliver a stored video by id or by name fragment.
    pub async fn play(
        &self,
        identifier: &str,
        requester: &dyn Requester,
    ) -> Result<DeliveryOutcome, VidrunError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(VidrunError::MissingIdentifier);
        }

        let catalog = self.open_catalog().await?;
        let entry = match identifier.parse::<u64>() {
            Ok(id) => catalog.find_by_id(id),
            Err(_) => catalog.find_by_name(identifier),
        }
        .ok_or_else(|| VidrunError::VideoNotFound(identifier.to_string()))?;

        let path = catalog.artifact_path(entry);
        if !path.exists() {
            return Err(VidrunError::MissingFile(entry.filename.clone()));
        }

        reply(
            requester,
            &format!("Sending video: {} - {}", entry.filename, entry.prompt),
        )
        .await;

        let fallback = format!(
            "Video file path: {}\nCould not send the video directly, please open it manually",
            path.display()
        );
        let delivery = self
            .dispatcher
            .deliver(&DeliveryRequest::file(&path, fallback), requester)
            .await;
        if delivery.delivered_file() {
            reply(requester, "Video sent successfully!").await;
        }
        Ok(delivery)
    }
}

fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed video file {:?}", path),
        Err(e) => tracing::warn!("Failed to remove video file {:?}: {}", path, e),
    }
}

/// One `filename, prompt` line per video.
pub fn format_video_list(entries: &[CatalogEntry]) -> String {
    let mut out = String::from("Video list:");
    for entry in entries {
        out.push_str(&format!("\n{}, {}", entry.filename, entry.prompt));
    }
    out
}

/// Numbered model list with the current default marked.
pub fn format_model_list(current: &str) -> String {
    let mut out = String::from("Supported models:");
    for (i, model) in SUPPORTED_MODELS.iter().enumerate() {
        let marker = if *model == current { " (current)" } else { "" };
        out.push_str(&format!("\n{}. {}{}", i + 1, model, marker));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Console {
        context: Value,
        texts: Mutex<Vec<String>>,
    }

    impl Console {
        fn new() -> Self {
            Self {
                context: json!({}),
                texts: Mutex::new(Vec::new()),
            }
        }

        fn texts(&self) -> Vec<String> {
            self.texts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Requester for Console {
        async fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn conversation(&self) -> &Value {
            &self.context
        }
    }

    fn service_in(dir: &TempDir) -> VideoService {
        let mut config = Config::default().with_api_key_override("ark-0123456789abcdef");
        config.settings.download_dir = dir.path().join("videos").display().to_string();
        VideoService::new(config)
            .unwrap()
            .with_config_path(dir.path().join("config.json"))
            .with_dispatcher(DeliveryDispatcher::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_prompt() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir);
        let console = Console::new();
        let err = service.generate("   ", None, &console).await.unwrap_err();
        assert_eq!(err, VidrunError::MissingPrompt);
        assert!(console.texts().is_empty());
    }

    #[tokio::test]
    async fn test_generate_reports_config_errors_first() {
        let dir = TempDir::new().unwrap();
        let config = Config::default().with_api_key_override("short");
        let service = VideoService::new(config).unwrap().with_config_path(dir.path().join("c.json"));
        let console = Console::new();

        let err = service.generate("a cat", None, &console).await.unwrap_err();
        assert!(matches!(err, VidrunError::Config(_)));
        // Nothing was said to the requester, so nothing was submitted
        assert!(console.texts().is_empty());
    }

    #[tokio::test]
    async fn test_generate_requires_key() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.settings.download_dir = dir.path().display().to_string();
        let service = VideoService::new(config).unwrap();
        let err = service.generate("a cat", None, &Console::new()).await.unwrap_err();
        assert!(matches!(err, VidrunError::Config(_)));
    }

    #[tokio::test]
    async fn test_list_videos_empty_and_populated() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir);
        let console = Console::new();

        assert!(service.list_videos(&console).await.unwrap().is_empty());
        assert_eq!(console.texts(), vec!["No videos generated yet"]);

        let mut catalog = service.open_catalog().await.unwrap();
        catalog.record(1, "first", "m", "o1").unwrap();
        catalog.record(2, "second", "m", "o2").unwrap();

        let console = Console::new();
        let entries = service.list_videos(&console).await.unwrap();
        assert_eq!(entries.len(), 2);
        let text = &console.texts()[0];
        assert!(text.contains("1.mp4, first"));
        assert!(text.contains("2.mp4, second"));
    }

    #[tokio::test]
    async fn test_list_models_marks_current() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir);
        let console = Console::new();
        assert_eq!(service.list_models(&console).await.len(), 3);
        let text = &console.texts()[0];
        assert!(text.contains(&format!("1. {} (current)", SUPPORTED_MODELS[0])));
        assert!(text.contains(&format!("3. {}", SUPPORTED_MODELS[2])));
    }

    #[tokio::test]
    async fn test_select_model_persists() {
        let dir = TempDir::new().unwrap();
        let mut service = service_in(&dir);
        let console = Console::new();

        let model = service.select_model("2", &console).await.unwrap();
        assert_eq!(model, SUPPORTED_MODELS[1]);
        assert_eq!(service.config().api.model_id, SUPPORTED_MODELS[1]);

        let saved = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(saved.api.model_id, SUPPORTED_MODELS[1]);
        assert!(console.texts().contains(&"Configuration updated".to_string()));
    }

    #[tokio::test]
    async fn test_select_model_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let mut service = service_in(&dir);
        for input in ["0", "4", "two", ""] {
            let err = service.select_model(input, &Console::new()).await.unwrap_err();
            assert!(matches!(err, VidrunError::InvalidModelIndex { max: 3, .. }));
        }
        assert!(!dir.path().join("config.json").exists());
    }

    #[tokio::test]
    async fn test_play_lookup_and_fallback() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir);
        let mut catalog = service.open_catalog().await.unwrap();
        let entry = catalog.record(1, "a kitten chasing a ball", "m", "o").unwrap();
        std::fs::write(catalog.artifact_path(&entry), b"video").unwrap();
        catalog.record(2, "a dog", "m", "o").unwrap();

        let console = Console::new();
        let outcome = service.play("kitten", &console).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::TextFallback);
        let texts = console.texts();
        assert!(texts[0].contains("1.mp4 - a kitten chasing a ball"));
        assert!(texts[1].contains("1.mp4"));

        // Known id whose file is gone
        let err = service.play("2", &Console::new()).await.unwrap_err();
        assert_eq!(err, VidrunError::MissingFile("2.mp4".to_string()));

        let err = service.play("99", &Console::new()).await.unwrap_err();
        assert_eq!(err, VidrunError::VideoNotFound("99".to_string()));

        let err = service.play(" ", &Console::new()).await.unwrap_err();
        assert_eq!(err, VidrunError::MissingIdentifier);
    }
}
