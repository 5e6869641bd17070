//! Replays a short recorded drive through a testblock.
//!
//! The drive goes out one metre, holds while the robot is pushed aside (the
//! testblock is paused, so that motion does not count) and comes back. Poses
//! are published at roughly 33 Hz and picked up by a 100 Hz polling sampler.
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use metron::{
    PhaseMachine, PollingSampler, Reporter, Sampler, SamplingConfig, Testblock,
    report::{JsonReporter, StdoutReporter},
    sample::{FramedPose, PoseSample, Timestamp, TransformBatch},
    source::PoseBuffer,
};

const METRICS: &str = r#"
time: []
path_length:
  - root_frame: map
    measured_frame: base_link
    groundtruth: 2.0
    groundtruth_epsilon: 0.1
"#;

const STEP: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Phase {
    Outbound,
    Hold,
    Return,
    Done,
}

struct Replay {
    block: Testblock,
    poses: Arc<PoseBuffer>,
    epoch: Instant,
    x: f64,
}

impl Replay {
    fn now(&self) -> Timestamp {
        self.epoch.elapsed()
    }

    fn publish(&self) {
        let pose = PoseSample::from_translation([self.x, 0.0, 0.0], self.now());
        self.poses.publish(&TransformBatch::new(
            "/tf",
            vec![FramedPose::new("map", "base_link", pose)],
        ));
        thread::sleep(Duration::from_millis(30));
    }

    fn drive(&mut self, dx: f64, steps: usize) {
        for _ in 0..steps {
            self.x += dx;
            self.publish();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let sampling = SamplingConfig::default();
    let block = Testblock::from_yaml("replay", METRICS, &sampling)?;
    let poses = Arc::new(PoseBuffer::new());
    let sampler = PollingSampler::from_config(poses.clone(), &sampling).spawn(block.path_metrics());

    let mut machine = PhaseMachine::builder()
        .state(Phase::Outbound, |r: &mut Replay| {
            r.publish();
            r.block.start(r.now());
            r.drive(STEP, 20);
            Phase::Hold
        })
        .state(Phase::Hold, |r: &mut Replay| {
            r.block.pause(r.now());
            r.block.purge(r.now());
            r.drive(STEP, 10);
            Phase::Return
        })
        .state(Phase::Return, |r: &mut Replay| {
            r.block.start(r.now());
            r.drive(-STEP, 20);
            r.block.stop(r.now());
            Phase::Done
        })
        .terminal(Phase::Done)
        .start(Phase::Outbound)
        .build()?;

    let replay = Replay {
        block,
        poses,
        epoch: Instant::now(),
        x: 0.0,
    };
    // the handlers sleep between poses, keep them off the runtime threads
    let (replay, end) = tokio::task::spawn_blocking(move || {
        let mut replay = replay;
        let end = machine.run(&mut replay);
        (replay, end)
    })
    .await?;
    let end = end?;
    tracing::info!(?end, "Replay finished");

    let stats = sampler.shutdown().await?;
    tracing::info!(?stats, "Sampler stats");

    let report = replay.block.results();
    StdoutReporter.report(&report).await?;
    JsonReporter::new(std::io::stdout()).report(&report).await?;
    Ok(())
}
