//! End-to-end scenarios driven against the distributor's capture queue
//! and playout state directly — no real sockets needed.

use frame_relay::config::DistributorConfig;
use frame_relay::distributor::Distributor;
use frame_relay::frame::ProcessedFrame;

fn processed(index: u64, worker_id: u64) -> ProcessedFrame {
    ProcessedFrame::new(index, worker_id, 0.0, 0.0, vec![index as u8])
}

#[test]
fn scenario_fan_out_to_two_workers_holds_noncontiguous_entries() {
    // Scenario 2: two workers, one fast (worker 1) one slow (worker 2).
    // Submit 30 frames; the fast worker's results arrive well ahead of the
    // slow one's, so at some point the buffer holds non-contiguous
    // entries, yet the display cursor only ever moves forward.
    let dist = Distributor::new(DistributorConfig {
        frame_delay: 3,
        ..DistributorConfig::default()
    })
    .unwrap();

    for i in 0..30u64 {
        dist.submit_frame(vec![i as u8], None);
    }

    // Fast worker returns every third frame quickly; slow worker trails.
    let mut saw_noncontiguous = false;
    let mut last_display = 0u64;
    for i in 0..30u64 {
        if i % 3 == 0 {
            dist.ingest_processed(processed(i, 1));
        }
        dist.render_tick();
        let stats = dist.stats();
        if stats.buffer_size >= 2 {
            saw_noncontiguous = true;
        }
        assert!(stats.current_display_frame >= last_display);
        last_display = stats.current_display_frame;
    }
    // Slow worker's results trickle in after the fast ones.
    for i in 0..30u64 {
        if i % 3 != 0 {
            dist.ingest_processed(processed(i, 2));
        }
        dist.render_tick();
        let stats = dist.stats();
        assert!(stats.current_display_frame >= last_display);
        last_display = stats.current_display_frame;
    }
    assert!(saw_noncontiguous);
}

#[test]
fn scenario_overload_drop_leaves_playout_idle() {
    // Scenario 3: 100 submits at no-drain, no workers connected.
    let dist = Distributor::new(DistributorConfig {
        capture_queue_size: 10,
        ..DistributorConfig::default()
    })
    .unwrap();

    for _ in 0..100 {
        dist.submit_frame(vec![0u8; 4], None);
    }

    assert_eq!(dist.capture_counter(), 100);
    assert_eq!(dist.last_frame_sent(), -1);
    assert_eq!(dist.stats().buffer_size, 0);
    assert!(dist.render_tick().is_none());
}

#[test]
fn scenario_lost_frame_midstream_advances_past_hole() {
    // Scenario 4, repeated here against the Distributor's own wiring
    // (reorder.rs already covers the PlayoutState in isolation).
    let dist = Distributor::new(DistributorConfig {
        frame_delay: 2,
        ..DistributorConfig::default()
    })
    .unwrap();

    for i in 0..10u64 {
        if i == 4 {
            continue;
        }
        dist.ingest_processed(processed(i, 1));
        dist.render_tick();
    }

    assert_eq!(dist.stats().current_display_frame, 7);
    assert!(dist.render_tick().is_some() || dist.stats().buffer_size > 0);
}
