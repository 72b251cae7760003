use anyhow::{bail, Context, Result};
use game_input::logging::{self, Logger};
use game_input::{Actions, FrameClock, InputConfig, InputDispatcher, Replay, ReplayScript};
use log::LevelFilter;
use std::io::{self, Write};
use std::path::PathBuf;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_args(&args)?;

    let mut logger = Logger::new(options.log_level);
    if let Some(path) = &options.log_file {
        logger = logger.with_file_output(path);
    }
    logging::init(logger);

    let config = match &options.config {
        Some(path) => InputConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => InputConfig::default(),
    };
    let script = ReplayScript::from_path(&options.script)
        .with_context(|| format!("failed to load script {}", options.script.display()))?;

    let mut actions = Actions::new();
    for name in config.action_names() {
        let action = name.to_string();
        actions.register(name, move |source| {
            log::info!("action {} triggered by {}", action, source);
        });
    }

    let mut dispatcher = InputDispatcher::new();
    dispatcher
        .apply_config(&config, &actions)
        .context("invalid input config")?;

    let mut replay = Replay::new(dispatcher, FrameClock::from(&config.frame));
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for step in &script.steps {
        for record in replay.step(step) {
            serde_json::to_writer(&mut out, &record)?;
            writeln!(out)?;
        }
    }

    Ok(())
}

struct Options {
    config: Option<PathBuf>,
    script: PathBuf,
    log_level: LevelFilter,
    log_file: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut config = None;
    let mut script = None;
    let mut log_level = LevelFilter::Warn;
    let mut log_file = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().context("--config requires a path")?;
                config = Some(PathBuf::from(value));
            }
            "--log-level" => {
                let value = iter.next().context("--log-level requires a level")?;
                log_level = value
                    .parse()
                    .with_context(|| format!("unknown log level {}", value))?;
            }
            "--log-file" => {
                let value = iter.next().context("--log-file requires a path")?;
                log_file = Some(PathBuf::from(value));
            }
            other if other.starts_with("--") => bail!("unknown option {}", other),
            other => {
                if script.is_some() {
                    bail!("unexpected argument {}", other);
                }
                script = Some(PathBuf::from(other));
            }
        }
    }

    let Some(script) = script else {
        bail!("usage: game-input [--config <file>] [--log-level <level>] [--log-file <file>] <script>");
    };

    Ok(Options {
        config,
        script,
        log_level,
        log_file,
    })
}
