// context.rs — Composition root: wire storage, policy, and the service.

use std::path::Path;
use std::sync::Arc;

use waymark_config::{Layout, Settings};
use waymark_domain::{ClaimPolicy, ClaimStore, GoalService, GoalViewStore, TurnGate};
use waymark_events::{Clock, EventStore, SystemClock};
use waymark_store_sqlite::{
    open_database, SqliteClaimStore, SqliteEventStore, SqliteGoalViews,
};

/// Everything a command needs for one invocation: the SQLite-backed
/// ports, the claim policy and turn gate from settings, and the service
/// on top of them.
pub struct AppContext {
    pub layout: Layout,
    pub settings: Settings,
    pub events: Arc<dyn EventStore>,
    pub views: Arc<dyn GoalViewStore>,
    pub service: GoalService,
}

impl AppContext {
    pub fn build(project_root: &Path) -> anyhow::Result<Self> {
        let layout = Layout::for_project(project_root);
        let settings = layout.prepare()?;
        tracing::debug!(
            database = %layout.database.display(),
            turn_limit = settings.qa.default_turn_limit,
            claim_minutes = settings.claims.claim_duration_minutes,
            "context ready"
        );

        let conn = open_database(&layout.database)?;
        let events: Arc<dyn EventStore> = Arc::new(SqliteEventStore::new(Arc::clone(&conn)));
        let views: Arc<dyn GoalViewStore> = Arc::new(SqliteGoalViews::new(Arc::clone(&conn)));
        let claims: Arc<dyn ClaimStore> = Arc::new(SqliteClaimStore::new(conn));

        let service = GoalService::new(
            Arc::clone(&events),
            Arc::clone(&views),
            claims,
            ClaimPolicy::new(settings.claims.claim_duration_minutes),
            TurnGate::new(settings.qa.default_turn_limit),
            Arc::new(SystemClock) as Arc<dyn Clock>,
        );

        Ok(Self {
            layout,
            settings,
            events,
            views,
            service,
        })
    }
}
