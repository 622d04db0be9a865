// rebuild.rs — Rebuild goal views from the event log.

use std::sync::Arc;

use waymark_domain::rebuild_views;

use crate::context::AppContext;

pub fn execute(ctx: &AppContext) -> anyhow::Result<()> {
    let replayed = rebuild_views(ctx.events.as_ref(), Arc::clone(&ctx.views))?;
    println!("Views rebuilt from {replayed} event(s).");
    Ok(())
}
