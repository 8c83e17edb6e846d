//! Submission must never wait on tick execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use engine_app::{World, system};
use engine_tx::{Signature, TransactionType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tap {
    n: u64,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_add_transaction_while_system_blocks() {
    let tap = TransactionType::<Tap>::new("tap");
    let mut world = World::new();
    world.register_transaction_types(&[&tap]).unwrap();

    let entered = Arc::new(AtomicBool::new(false));
    let release = Arc::new(AtomicBool::new(false));
    let entered_flag = Arc::clone(&entered);
    let release_flag = Arc::clone(&release);
    world
        .add_system(system("stuck", move |_ctx| {
            entered_flag.store(true, Ordering::SeqCst);
            while !release_flag.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        }))
        .unwrap();
    world.load_game_state().unwrap();

    let queue = world.queue();
    let current = world.current_system_handle();
    let ticking = tokio::task::spawn_blocking(move || {
        world.tick().unwrap();
        world
    });

    while !entered.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(current.get().as_deref(), Some("stuck"));

    let submitted = tokio::time::timeout(Duration::from_millis(500), async {
        for n in 0..10 {
            tap.add_to_queue(&queue, Tap { n }, Signature::new("client", n))
                .unwrap();
        }
    })
    .await;
    assert!(submitted.is_ok(), "submission blocked on a running tick");
    assert_eq!(queue.pending(), 10);

    release.store(true, Ordering::SeqCst);
    let world = ticking.await.unwrap();
    assert_eq!(world.current_tick(), 1);
    assert_eq!(current.get(), None);
    // The blocked tick's batch was frozen before these arrived.
    assert_eq!(world.queue().pending(), 10);
}

#[test]
fn test_concurrent_submitters_across_ticks_lose_nothing() {
    let tap = TransactionType::<Tap>::new("tap");
    let mut world = World::new();
    world.register_transaction_types(&[&tap]).unwrap();

    let processed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&processed);
    let view = tap.clone();
    world
        .add_system(system("count_taps", move |ctx| {
            counter.fetch_add(ctx.transactions(&view).count(), Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
    world.load_game_state().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let submitters: Vec<_> = (0..4)
        .map(|t| {
            let queue = world.queue();
            let tap = tap.clone();
            std::thread::spawn(move || {
                for n in 0..500 {
                    tap.add_to_queue(&queue, Tap { n }, Signature::new(format!("client-{t}"), n))
                        .unwrap();
                }
            })
        })
        .collect();

    let ticker_done = Arc::clone(&done);
    let ticker = std::thread::spawn(move || {
        while !ticker_done.load(Ordering::SeqCst) {
            world.tick().unwrap();
        }
        // Drain whatever arrived after the last loop tick.
        world.tick().unwrap();
        world
    });

    for handle in submitters {
        handle.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    let world = ticker.join().unwrap();

    assert_eq!(processed.load(Ordering::SeqCst), 2000);
    assert_eq!(world.queue().total_submitted(), 2000);
    assert_eq!(world.queue().pending(), 0);
}
