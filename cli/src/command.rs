use crate::error::{
    Error,
    Result,
};
use clap::{
    Parser,
    Subcommand,
};
use core::str::FromStr;
use std::path::PathBuf;
use xgov_client::{
    Address,
    ErrorKind,
    FilterKind,
    RoundId,
    SortMode,
    VoteSession,
    VotingRoundClient,
};

#[derive(Clone, Debug, Parser)]
pub struct Opts {
    #[clap(subcommand)]
    pub cmd: SubCommand,
    #[clap(short = 'p', long = "path")]
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Subcommand)]
pub enum SubCommand {
    Show(ShowCommand),
    Vote(VoteCommand),
    Close(CloseCommand),
}

/// Loads a round, mapping the errors that block entry to a plain refusal.
async fn load<C: VotingRoundClient>(
    session: &VoteSession<C>,
    round: RoundId,
) -> Result<()> {
    match session.load_round(round).await {
        Err(err) if err.kind() == ErrorKind::Configuration => {
            Err(Error::RoundUnavailable(round))
        }
        other => Ok(other?),
    }
}

#[derive(Clone, Debug, Parser)]
pub struct ShowCommand {
    pub round: RoundId,
    #[clap(long)]
    pub address: Option<String>,
    #[clap(long, default_value = "none")]
    pub sort: SortMode,
    #[clap(long = "category")]
    pub categories: Vec<String>,
    #[clap(long = "focus")]
    pub focus_areas: Vec<String>,
}

impl ShowCommand {
    pub async fn exec<C: VotingRoundClient>(
        &self,
        session: &VoteSession<C>,
    ) -> Result<()> {
        if let Some(address) = &self.address {
            session.set_address(Some(Address::new(address))).await?;
        }
        load(session, self.round).await?;
        session.set_sort(self.sort).await;
        for name in &self.categories {
            session.toggle_filter(FilterKind::Category, name).await;
        }
        for name in &self.focus_areas {
            session.toggle_filter(FilterKind::Focus, name).await;
        }

        if let Some(metadata) = session.metadata().await {
            println!("{} (round {})", metadata.title, self.round);
        }
        for view in session.ordered_questions().await? {
            let ask = view.question.ask().unwrap_or_default();
            println!(
                "{:>5.1}% {} {} ask {} tally {} ({:.0}%{})",
                view.allocation.percentage,
                view.question.id,
                view.question.prompt,
                ask,
                view.tally,
                view.pass_state.percentage,
                if view.pass_state.passed { ", passed" } else { "" },
            );
        }

        let status = session.status().await;
        if self.address.is_some() {
            let eligibility = session.eligibility().await;
            if eligibility.eligible {
                println!(
                    "Eligible with {} votes",
                    eligibility.weight.get()
                );
            } else {
                println!("Not eligible to vote in this round");
            }
            if status.has_voted {
                println!("Already voted");
            }
        }
        if status.has_closed {
            println!("Voting round is closed");
        } else if status.has_ended {
            println!("Voting has ended");
        } else if !status.has_started {
            println!("Voting has not started");
        }
        Ok(())
    }
}

/// `<question>=<percentage>` as given on the command line.
#[derive(Clone, Debug, PartialEq)]
pub struct AllocationArg {
    pub question: String,
    pub percentage: f64,
}

impl FromStr for AllocationArg {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAllocation(s.to_string());
        let mut parts = s.splitn(2, '=');
        let question = parts.next().filter(|q| !q.is_empty()).ok_or_else(invalid)?;
        let percentage = parts
            .next()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .ok_or_else(invalid)?;
        Ok(AllocationArg {
            question: question.trim().to_string(),
            percentage,
        })
    }
}

#[derive(Clone, Debug, Parser)]
pub struct VoteCommand {
    pub round: RoundId,
    #[clap(long)]
    pub address: String,
    #[clap(long = "allocate", required = true)]
    pub allocations: Vec<AllocationArg>,
}

impl VoteCommand {
    pub async fn exec<C: VotingRoundClient>(
        &self,
        session: &VoteSession<C>,
    ) -> Result<()> {
        session.set_address(Some(Address::new(&self.address))).await?;
        load(session, self.round).await?;
        for allocation in &self.allocations {
            let stored = session
                .allocate(&allocation.question, allocation.percentage)
                .await?;
            if stored != allocation.percentage {
                println!(
                    "Allocated {}% to {} instead of {}%",
                    stored, allocation.question, allocation.percentage
                );
            }
        }
        let submission = session.submit().await?;
        println!(
            "Account {} voted in round {} with weightings {:?}",
            submission.signer, submission.round, submission.weightings
        );
        Ok(())
    }
}

#[derive(Clone, Debug, Parser)]
pub struct CloseCommand {
    pub round: RoundId,
    #[clap(long)]
    pub signer: String,
}

impl CloseCommand {
    pub async fn exec<C: VotingRoundClient>(
        &self,
        session: &VoteSession<C>,
    ) -> Result<()> {
        let signer = Address::new(&self.signer);
        session.set_address(Some(signer.clone())).await?;
        load(session, self.round).await?;
        session.close_round(&signer).await?;
        println!("Account {} closed voting round {}", signer, self.round);
        Ok(())
    }
}
