//! Command-line interface

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing::info;

use crate::config::Config;
use crate::git::GitManager;
use crate::llm::LlmRouter;
use crate::prompt::PromptEngine;
use crate::stt::create_stt_provider;
use crate::tts::create_tts_provider;

#[derive(Parser)]
#[command(name = "voxcode", version, about = "Voice-driven development assistant")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Transcribe an audio file to text
    Transcribe {
        /// Audio file path
        file: PathBuf,
    },
    /// Translate natural language into a structured prompt
    Translate {
        /// Natural language input
        text: String,
        /// Task type for the prompt
        #[arg(long, default_value = "code_generation")]
        task_type: String,
        /// Skip the chain-of-thought block
        #[arg(long)]
        no_cot: bool,
    },
    /// Full pipeline: audio file to generated code
    VoiceToCode {
        /// Audio file path
        file: PathBuf,
        /// Task type for routing
        #[arg(long, default_value = "code_generation")]
        task_type: String,
        /// Route through the agent swarm
        #[arg(long)]
        swarm: bool,
        /// Write generated code to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Synthesize text to speech
    Speak {
        /// Text to speak
        text: String,
        /// Voice or model override
        #[arg(long)]
        voice: Option<String>,
        /// Output audio file
        #[arg(long, default_value = "output.wav")]
        output: PathBuf,
    },
    /// Show git status of a repository
    GitStatus {
        /// Repository path
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.api.host = host;
            }
            if let Some(port) = port {
                config.api.port = port;
            }
            crate::server::run(config).await
        }

        Commands::Transcribe { file } => {
            let stt = create_stt_provider(&config.stt)?;
            let text = stt.transcribe_file(&file).await?;
            println!("{text}");
            Ok(())
        }

        Commands::Translate {
            text,
            task_type,
            no_cot,
        } => {
            let engine = match &config.prompt.template_dir {
                Some(dir) => PromptEngine::with_template_dir(dir)?,
                None => PromptEngine::new(),
            };
            let include_cot = !no_cot && config.prompt.enable_cot;
            let prompt =
                engine.translate_to_structured_prompt(&text, &task_type, include_cot, &[]);
            println!("{prompt}");
            Ok(())
        }

        Commands::VoiceToCode {
            file,
            task_type,
            swarm,
            output,
        } => {
            let stt = create_stt_provider(&config.stt)?;
            let transcript = stt.transcribe_file(&file).await?;
            info!("Transcript: {transcript}");

            let engine = PromptEngine::new();
            let prompt = engine.translate_to_structured_prompt(
                &transcript,
                &task_type,
                config.prompt.enable_cot,
                &[],
            );

            let router = LlmRouter::from_config(&config.llm);
            let mut stream = router
                .route_task(&prompt, &task_type, swarm, None, output.is_none())
                .await?;

            match output {
                Some(path) => {
                    let mut code = String::new();
                    while let Some(fragment) = stream.next().await {
                        code.push_str(&fragment?);
                    }
                    std::fs::write(&path, code)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Wrote generated code to {}", path.display());
                }
                None => {
                    // Print fragments as they arrive
                    while let Some(fragment) = stream.next().await {
                        print!("{}", fragment?);
                    }
                    println!();
                }
            }
            Ok(())
        }

        Commands::Speak {
            text,
            voice,
            output,
        } => {
            let tts = create_tts_provider(&config.tts)?;
            let audio = tts.synthesize(&text, voice.as_deref()).await?;
            std::fs::write(&output, audio)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Wrote audio to {}", output.display());
            Ok(())
        }

        Commands::GitStatus { path } => {
            let git = GitManager::new(path);
            let status = git.status().await?;
            println!("On branch {}", status.branch);
            if status.clean {
                println!("Working tree clean");
            } else {
                for file in &status.files {
                    println!("{} {}", file.status, file.path);
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_translate_args() {
        let cli = Cli::try_parse_from([
            "voxcode",
            "translate",
            "build a rest api",
            "--task-type",
            "code_review",
            "--no-cot",
        ])
        .unwrap();
        match cli.command {
            Commands::Translate {
                text,
                task_type,
                no_cot,
            } => {
                assert_eq!(text, "build a rest api");
                assert_eq!(task_type, "code_review");
                assert!(no_cot);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_voice_to_code_defaults() {
        let cli = Cli::try_parse_from(["voxcode", "voice-to-code", "clip.wav"]).unwrap();
        match cli.command {
            Commands::VoiceToCode {
                file,
                task_type,
                swarm,
                output,
            } => {
                assert_eq!(file, PathBuf::from("clip.wav"));
                assert_eq!(task_type, "code_generation");
                assert!(!swarm);
                assert!(output.is_none());
            }
            _ => panic!("wrong subcommand"),
        }
    }
}
