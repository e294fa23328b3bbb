//! Command handling for the worker protocol

use anyhow::Result;
use podsearch_index::TranscriptIndex;
use podsearch_pipeline::{
    EpisodeAudio, IngestionService, PipelineContext, RetrievalService, Settings,
};
use podsearch_types::{PlayableHit, WorkerCommand, WorkerResponse};
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

pub struct Worker {
    ingestion: IngestionService,
    retrieval: RetrievalService,
    audio: EpisodeAudio,
    index: Arc<TranscriptIndex>,
}

impl Worker {
    pub fn new(ctx: &PipelineContext, settings: &Settings) -> Self {
        Self {
            ingestion: IngestionService::new(ctx, settings.ingest.reingest_policy),
            retrieval: RetrievalService::new(ctx),
            audio: EpisodeAudio::new(settings.uploads_dir(), settings.snippets_dir()),
            index: ctx.index.clone(),
        }
    }

    /// Execute one command; failures become `WorkerResponse::Error`
    pub fn handle(&self, command: WorkerCommand) -> WorkerResponse {
        match self.try_handle(command) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Command failed: {:#}", e);
                WorkerResponse::Error {
                    message: format!("{:#}", e),
                }
            }
        }
    }

    fn try_handle(&self, command: WorkerCommand) -> Result<WorkerResponse> {
        let response = match command {
            WorkerCommand::StageUpload {
                episode_id,
                extension,
                source_path,
            } => {
                let staged = self
                    .audio
                    .stage_upload(&episode_id, &extension, Path::new(&source_path))?;
                WorkerResponse::Staged {
                    audio_path: staged.to_string_lossy().into_owned(),
                }
            }

            WorkerCommand::Ingest {
                audio_path,
                episode_id,
            } => {
                let segment_count = self
                    .ingestion
                    .ingest_episode(Path::new(&audio_path), &episode_id)?;
                WorkerResponse::Ingested {
                    episode_id,
                    segment_count,
                }
            }

            WorkerCommand::Search {
                query,
                top_k,
                with_snippets,
            } => {
                let hits = self.retrieval.search(&query, top_k)?;
                let hits = if with_snippets {
                    self.audio.with_snippets(hits)
                } else {
                    hits.into_iter()
                        .map(|hit| PlayableHit {
                            hit,
                            snippet_path: None,
                        })
                        .collect()
                };
                WorkerResponse::SearchResults { hits }
            }

            WorkerCommand::Snippet {
                audio_path,
                start,
                end,
            } => {
                let path = self.audio.extract(Path::new(&audio_path), start, end)?;
                WorkerResponse::Snippet {
                    path: path.to_string_lossy().into_owned(),
                }
            }

            WorkerCommand::Stats => WorkerResponse::Stats(self.index.stats()?),

            WorkerCommand::Shutdown => WorkerResponse::Ok,
        };
        Ok(response)
    }
}

fn write_response(output: &mut impl Write, response: &WorkerResponse) -> Result<()> {
    writeln!(output, "{}", serde_json::to_string(response)?)?;
    output.flush()?;
    Ok(())
}

/// Read JSON-lines commands from `input` until EOF or `Shutdown`
pub fn run(worker: &Worker, input: impl BufRead, mut output: impl Write) -> Result<()> {
    tracing::info!("Worker ready, listening for commands");

    for line in input.lines() {
        let line = line?;

        if line.trim().is_empty() {
            continue;
        }

        let command: WorkerCommand = match serde_json::from_str(&line) {
            Ok(cmd) => cmd,
            Err(e) => {
                let response = WorkerResponse::Error {
                    message: format!("Invalid command: {}", e),
                };
                write_response(&mut output, &response)?;
                continue;
            }
        };

        if matches!(command, WorkerCommand::Shutdown) {
            tracing::info!("Shutdown command received");
            write_response(&mut output, &WorkerResponse::Ok)?;
            break;
        }

        let response = worker.handle(command);
        write_response(&mut output, &response)?;
    }

    tracing::info!("Worker shutting down");
    Ok(())
}
