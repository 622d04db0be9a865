// review.rs — Review subcommands.

use clap::Subcommand;

use crate::context::AppContext;

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// Record one QA review turn for a goal.
    Record {
        /// Goal id.
        id: String,
        /// Turn number being recorded (1-based).
        turn: u32,
        #[arg(long, default_value = "local")]
        worker: String,
    },
}

pub fn execute(cmd: &ReviewCommands, ctx: &AppContext) -> anyhow::Result<()> {
    match cmd {
        ReviewCommands::Record { id, turn, worker } => {
            let receipt = ctx.service.record_review(id, worker, *turn)?;
            let report = ctx.service.show(id)?;
            println!(
                "Review turn {turn} recorded for {} (v{}); {} turn(s) remaining.",
                receipt.id, receipt.version, report.remaining_turns
            );
            Ok(())
        }
    }
}
