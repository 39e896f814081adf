use crate::{
    command::*,
    error::Error,
};
use clap::Parser;
use exitfailure::ExitDisplay;
use std::path::PathBuf;
use xgov_client::{
    Config,
    LocalStore,
    VoteSession,
};

mod command;
mod error;

#[async_std::main]
async fn main() -> Result<(), ExitDisplay<Error>> {
    Ok(run().await?)
}

struct Paths {
    store: PathBuf,
}

impl Paths {
    fn new(root: Option<PathBuf>) -> Result<Self, Error> {
        let root = if let Some(root) = root {
            root
        } else {
            dirs::data_dir()
                .ok_or(Error::DataDirNotFound)?
                .join("xgov-cli")
        };
        Ok(Paths { store: root })
    }
}

async fn run() -> Result<(), Error> {
    env_logger::init();
    let opts: Opts = Opts::parse();
    let paths = Paths::new(opts.path)?;
    let config = Config::from_env()?;
    log::debug!("reading voting rounds from {}", paths.store.display());
    let session = VoteSession::new(LocalStore::new(paths.store), config);
    match opts.cmd {
        SubCommand::Show(cmd) => cmd.exec(&session).await?,
        SubCommand::Vote(cmd) => cmd.exec(&session).await?,
        SubCommand::Close(cmd) => cmd.exec(&session).await?,
    }
    Ok(())
}
