// goal.rs — Goal subcommands: the full lifecycle plus list and status.

use clap::Subcommand;
use uuid::Uuid;

use waymark_domain::{AddGoal, FinishOutcome, GoalPatch, GoalStatus};

use crate::context::AppContext;

#[derive(Subcommand)]
pub enum GoalCommands {
    /// Define a new goal.
    Add {
        /// What the goal should accomplish.
        objective: String,
        /// Success criterion (repeatable).
        #[arg(long = "criterion")]
        criteria: Vec<String>,
        /// In-scope item (repeatable).
        #[arg(long = "scope-in")]
        scope_in: Vec<String>,
        /// Out-of-scope item (repeatable).
        #[arg(long = "scope-out")]
        scope_out: Vec<String>,
        /// Boundary the agent must not cross (repeatable).
        #[arg(long = "boundary")]
        boundaries: Vec<String>,
        /// Free-form note.
        #[arg(long)]
        note: Option<String>,
        /// Goal id (defaults to a new UUID).
        #[arg(long)]
        id: Option<String>,
    },
    /// Start work on a goal and take its claim.
    Start {
        id: String,
        /// Worker identity used for the claim.
        #[arg(long, default_value = "local")]
        worker: String,
    },
    /// Update provided fields of a goal.
    Update {
        id: String,
        #[arg(long)]
        objective: Option<String>,
        /// Replace the success criteria (repeatable).
        #[arg(long = "criterion")]
        criteria: Option<Vec<String>>,
        /// Replace the in-scope list (repeatable).
        #[arg(long = "scope-in")]
        scope_in: Option<Vec<String>>,
        /// Replace the out-of-scope list (repeatable).
        #[arg(long = "scope-out")]
        scope_out: Option<Vec<String>>,
        /// Replace the boundaries (repeatable).
        #[arg(long = "boundary")]
        boundaries: Option<Vec<String>>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long, default_value = "local")]
        worker: String,
    },
    /// Block a goal on an obstacle.
    Block {
        id: String,
        /// Why the goal is blocked.
        note: String,
        #[arg(long, default_value = "local")]
        worker: String,
    },
    /// Clear a goal's blocker.
    Unblock {
        id: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long, default_value = "local")]
        worker: String,
    },
    /// Pause a goal and release its claim.
    Pause {
        id: String,
        /// Why the goal is paused.
        reason: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long, default_value = "local")]
        worker: String,
    },
    /// Resume a paused goal under a fresh claim.
    Resume {
        id: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long, default_value = "local")]
        worker: String,
    },
    /// Finish a goal: records a QA review turn, or completes with
    /// --commit (or once the turn budget runs out).
    Finish {
        id: String,
        /// Complete immediately instead of spending a review turn.
        #[arg(long)]
        commit: bool,
        #[arg(long, default_value = "local")]
        worker: String,
    },
    /// Send a goal back to to-do.
    Reset {
        id: String,
        #[arg(long, default_value = "local")]
        worker: String,
    },
    /// Hand a goal to QA review.
    Submit {
        id: String,
        #[arg(long, default_value = "local")]
        worker: String,
    },
    /// Qualify a reviewed goal.
    Qualify {
        id: String,
        #[arg(long, default_value = "local")]
        worker: String,
    },
    /// Remove a goal.
    Remove {
        id: String,
        #[arg(long, default_value = "local")]
        worker: String,
    },
    /// List goals.
    List {
        /// Filter by status (e.g. "doing", "blocked", "completed").
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one goal: view, claim, and review turn budget.
    Status { id: String },
}

pub fn execute(cmd: &GoalCommands, ctx: &AppContext) -> anyhow::Result<()> {
    match cmd {
        GoalCommands::Add {
            objective,
            criteria,
            scope_in,
            scope_out,
            boundaries,
            note,
            id,
        } => {
            let id = id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
            let receipt = ctx.service.add(
                &id,
                AddGoal {
                    objective: objective.clone(),
                    success_criteria: criteria.clone(),
                    scope_in: scope_in.clone(),
                    scope_out: scope_out.clone(),
                    boundaries: boundaries.clone(),
                    note: note.clone(),
                    context: None,
                },
            )?;
            println!("Goal added: {}", receipt.id);
            println!("  Objective: {objective}");
            println!("  Status:    {}", receipt.status);
            Ok(())
        }
        GoalCommands::Start { id, worker } => {
            let receipt = ctx.service.start(id, worker)?;
            println!("Goal started: {} (v{})", receipt.id, receipt.version);
            Ok(())
        }
        GoalCommands::Update {
            id,
            objective,
            criteria,
            scope_in,
            scope_out,
            boundaries,
            note,
            worker,
        } => {
            let receipt = ctx.service.update(
                id,
                worker,
                GoalPatch {
                    objective: objective.clone(),
                    success_criteria: criteria.clone(),
                    scope_in: scope_in.clone(),
                    scope_out: scope_out.clone(),
                    boundaries: boundaries.clone(),
                    note: note.clone(),
                },
            )?;
            println!("Goal updated: {} (v{})", receipt.id, receipt.version);
            Ok(())
        }
        GoalCommands::Block { id, note, worker } => {
            let receipt = ctx.service.block(id, worker, note)?;
            println!("Goal blocked: {} — {note}", receipt.id);
            Ok(())
        }
        GoalCommands::Unblock { id, note, worker } => {
            let receipt = ctx.service.unblock(id, worker, note.clone())?;
            println!("Goal unblocked: {} (v{})", receipt.id, receipt.version);
            Ok(())
        }
        GoalCommands::Pause {
            id,
            reason,
            note,
            worker,
        } => {
            let receipt = ctx.service.pause(id, worker, reason, note.clone())?;
            println!("Goal paused: {} — {reason}", receipt.id);
            Ok(())
        }
        GoalCommands::Resume { id, note, worker } => {
            let receipt = ctx.service.resume(id, worker, note.clone())?;
            println!("Goal resumed: {} (v{})", receipt.id, receipt.version);
            Ok(())
        }
        GoalCommands::Finish { id, commit, worker } => {
            match ctx.service.finish(id, worker, *commit)? {
                FinishOutcome::Completed { version } => {
                    println!("Goal completed: {id} (v{version})");
                }
                FinishOutcome::ReviewRecorded {
                    turn,
                    remaining,
                    prompt,
                } => {
                    println!("Review turn {turn} recorded ({remaining} remaining).");
                    println!("{prompt}");
                }
            }
            Ok(())
        }
        GoalCommands::Reset { id, worker } => {
            let receipt = ctx.service.reset(id, worker)?;
            println!("Goal reset: {} (v{})", receipt.id, receipt.version);
            Ok(())
        }
        GoalCommands::Submit { id, worker } => {
            let receipt = ctx.service.submit_for_review(id, worker)?;
            println!("Goal submitted for review: {}", receipt.id);
            Ok(())
        }
        GoalCommands::Qualify { id, worker } => {
            let receipt = ctx.service.qualify(id, worker)?;
            println!("Goal qualified: {}", receipt.id);
            Ok(())
        }
        GoalCommands::Remove { id, worker } => {
            ctx.service.remove(id, worker)?;
            println!("Goal removed: {id}");
            Ok(())
        }
        GoalCommands::List { status } => list_goals(ctx, status.as_deref()),
        GoalCommands::Status { id } => show_status(ctx, id),
    }
}

fn parse_status(raw: &str) -> anyhow::Result<GoalStatus> {
    GoalStatus::parse(raw).ok_or_else(|| {
        anyhow::anyhow!(
            "unknown status '{raw}' (expected one of: to-do, doing, blocked, paused, \
             in-review, qualified, completed)"
        )
    })
}

fn list_goals(ctx: &AppContext, status: Option<&str>) -> anyhow::Result<()> {
    let filter = status.map(parse_status).transpose()?;
    let goals = ctx.service.list(filter)?;

    if goals.is_empty() {
        println!("No goals found.");
        return Ok(());
    }

    println!("{:<38} {:<40} {:<11} {:>4}", "ID", "OBJECTIVE", "STATUS", "VER");
    println!("{}", "-".repeat(96));
    for g in &goals {
        println!(
            "{:<38} {:<40} {:<11} {:>4}",
            g.id,
            truncate(&g.objective, 38),
            g.status.to_string(),
            g.version,
        );
    }
    println!("\n{} goal(s) total.", goals.len());
    Ok(())
}

fn show_status(ctx: &AppContext, id: &str) -> anyhow::Result<()> {
    let report = ctx.service.show(id)?;
    let view = &report.view;

    println!("Goal:      {}", view.id);
    println!("Objective: {}", view.objective);
    println!("Status:    {}", view.status);
    println!("Version:   {}", view.version);
    if let Some(note) = &view.note {
        println!("Note:      {note}");
    }
    println!("Updated:   {}", view.updated_at.to_rfc3339());
    match &report.claim {
        Some(claim) => println!(
            "Claim:     {} until {}",
            claim.claimed_by,
            claim.claim_expires_at.to_rfc3339()
        ),
        None => println!("Claim:     (none)"),
    }
    println!(
        "Reviews:   {}/{} turns used ({} remaining)",
        report.current_turn, report.turn_limit, report.remaining_turns
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max - 3).collect();
        format!("{cut}...")
    } else {
        s.to_string()
    }
}
