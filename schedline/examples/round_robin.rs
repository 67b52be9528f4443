//! Minimal scheduler demo: four queues share one channel, each frame is
//! acknowledged with the full dequeue/start/finish status sequence, and
//! the emitted order shows the round-robin rotation.
//!
//! Run with: cargo run --example round_robin

use schedline::regs::{CMD_SET_PORT_ENABLE, CMD_SET_QUEUE_ENABLE};
use schedline::{ConfigBuilder, DequeueStatus, FinishStatus, StartStatus, TxScheduler};

fn main() {
    env_logger::init();

    let config = ConfigBuilder::new()
        .queue_index_bits(4)
        .pipeline(2)
        .op_table_size(8)
        .build()
        .expect("invalid config");
    let mut sched = TxScheduler::new(config).expect("scheduler");

    sched.channel_enable(0).unwrap();
    sched.set_channel_pkt_limit(0, 4).unwrap();
    sched.enable();

    for q in 0..4 {
        sched
            .queue_write_sync(q, CMD_SET_PORT_ENABLE | 1)
            .unwrap();
        sched
            .queue_write_sync(q, CMD_SET_QUEUE_ENABLE | 1)
            .unwrap();
        sched.push_doorbell(q).unwrap();
    }

    let mut served = 0;
    while served < 16 {
        sched.step();
        let Some(req) = sched.poll_tx_request() else {
            continue;
        };
        println!(
            "cycle {:4}  fetch queue {} (tag {})",
            sched.cycle(),
            req.queue,
            req.tag
        );

        // Play the queue manager and TX engine: 1500-byte frame each time.
        sched
            .push_dequeue_status(DequeueStatus {
                queue: req.queue,
                tag: req.tag,
                empty: false,
                error: false,
            })
            .unwrap();
        sched
            .push_start_status(StartStatus {
                queue: req.queue,
                tag: req.tag,
                len: 1500,
                error: false,
            })
            .unwrap();
        sched
            .push_finish_status(FinishStatus {
                queue: req.queue,
                tag: req.tag,
                len: 1500,
            })
            .unwrap();
        served += 1;
    }
}
