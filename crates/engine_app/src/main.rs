//! # engine_app — demo server
//!
//! Runs a world of scored players. A background task plays the role of an
//! external client, sending JSON-encoded `modify_score` messages through a
//! [`Router`] while the tick loop applies them.
//!
//! Stop with Ctrl-C, or pass `--max-ticks`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine_app::{EngineConfig, ReadType, Router, TickLoop, World, system};
use engine_component::{ArchetypeStore, Component, Entity, StoreError};
use engine_tx::{Schema, TransactionType, TxTypeId};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Score {
    value: i64,
}

impl Component for Score {
    fn type_name() -> &'static str {
        "Score"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModifyScore {
    target: Entity,
    amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ScoreRequest {
    entity: Entity,
}

#[derive(Debug, Serialize, Deserialize)]
struct ScoreReply {
    entity: Entity,
    score: i64,
}

fn build_world(config: &EngineConfig, modify_score: &TransactionType<ModifyScore>) -> Result<World> {
    let mut world = World::new();
    world.register_component::<Score>()?;
    world.register_transaction_types(&[modify_score])?;

    let score = ReadType::new("score", |store: &ArchetypeStore, req: ScoreRequest| {
        let score = store.get::<Score>(req.entity)?;
        Ok(ScoreReply {
            entity: req.entity,
            score: score.value,
        })
    })
    .with_schema(Schema::Json);
    world.register_reads(&[&score])?;

    let players = config.players;
    world.add_init_system(system("spawn_players", move |ctx| {
        let spawned = ctx.create_many(players, &[Score::component_type_id()])?;
        info!(count = spawned.len(), "spawned players");
        Ok(())
    }))?;

    let modify = modify_score.clone();
    world.add_system(system("apply_score", move |ctx| {
        for tx in ctx.transactions(&modify) {
            let amount = tx.amount;
            match ctx.update::<Score, _>(tx.target, |s| Score { value: s.value + amount }) {
                Ok(()) => {}
                Err(StoreError::EntityNotFound(entity)) => {
                    warn!(%entity, submitter = %tx.signature.submitter_tag, "score change for unknown entity");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }))?;

    world.load_game_state()?;
    Ok(world)
}

/// Stand-in for an external client: sends a score change every 50ms.
async fn send_score_changes(router: Arc<Router>, type_id: TxTypeId, players: usize) {
    if players == 0 {
        return;
    }
    let mut interval = tokio::time::interval(Duration::from_millis(50));
    for i in 0u64.. {
        interval.tick().await;
        let change = ModifyScore {
            target: Entity::from_raw(1 + i % players as u64),
            amount: (i % 7) as i64 - 3,
        };
        let bytes = match Schema::Json.encode(&change) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "failed to encode score change");
                continue;
            }
        };
        if let Err(err) = router.send_message(type_id.0, &bytes) {
            warn!(%err, "failed to route score change");
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "cannot listen for Ctrl-C, running until max ticks");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let config = EngineConfig::parse();
    info!(?config, "engine starting");

    let modify_score = TransactionType::<ModifyScore>::new("modify_score").with_schema(Schema::Json);
    let world = build_world(&config, &modify_score)?;
    let type_id = modify_score
        .id()
        .ok_or_else(|| anyhow::anyhow!("modify_score was not registered"))?;

    let router = Arc::new(Router::new(&world)?.with_submitter_tag(config.submitter_tag.clone()));
    let client = tokio::spawn(send_score_changes(Arc::clone(&router), type_id, config.players));

    let mut tick_loop = TickLoop::new(world, config.tick_config());
    let result = tick_loop.run_async(shutdown_signal()).await;
    client.abort();
    let ticks = result?;

    let world = tick_loop.into_world();
    let request = Schema::Json.encode(&ScoreRequest {
        entity: Entity::from_raw(1),
    })?;
    let reply = router.query(&world, "score", &request)?;
    info!(
        ticks,
        pending = world.queue().pending(),
        first_player = %String::from_utf8_lossy(&reply),
        "engine shut down"
    );
    Ok(())
}
