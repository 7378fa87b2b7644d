use std::{env, process};

use anyhow::{bail, Context};
use simon::{
    game::{Game, LogPresenter, Presenter},
    options::GameOptions,
    source::ReplaySource,
};

const USAGE: &str = "usage: simon [--fast] <recording.jsonl>";

fn main() -> anyhow::Result<()> {
    simon::init_logger!();

    let mut pace = true;
    let mut path = None;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--fast" => pace = false,
            "-h" | "--help" => {
                println!("{USAGE}");
                process::exit(0);
            }
            _ if path.is_none() => path = Some(arg),
            _ => bail!("unexpected argument `{}`\n{}", arg, USAGE),
        }
    }
    let Some(path) = path else {
        bail!("missing recording path\n{}", USAGE);
    };

    let mut presenter = LogPresenter::default();
    let source = match ReplaySource::open(&path) {
        Ok(source) => source.pace(pace),
        Err(e) => {
            presenter.capture_unavailable(&e);
            return Err(e).context("no landmark input");
        }
    };

    let options = GameOptions::default().with_env_overrides();
    log::debug!("{:?}", options);
    let mut game = Game::new(options, presenter);
    let summary = game
        .run(source)
        .with_context(|| format!("replaying {path}"))?;

    log::info!(
        "{} of {} rounds approved",
        summary.approved(),
        summary.rounds().len()
    );
    Ok(())
}
