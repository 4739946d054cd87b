use super::{ClockMonitor, Scheduler, SchedulerStatus};
use crate::command::InputMessage;
use crate::constants::clock::{CHECK_INTERVAL, IDLE_WAIT};
use crate::output::OutputMessage;
use anyhow::{anyhow, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Requests accepted by the service loop
#[derive(Debug)]
pub enum Request {
    Input(InputMessage),
    Status(oneshot::Sender<SchedulerStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable front end to a running scheduler
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Request>,
}

impl SchedulerHandle {
    pub fn submit(&self, input: InputMessage) -> Result<()> {
        self.tx
            .send(Request::Input(input))
            .map_err(|_| anyhow!("Scheduler is not running"))
    }

    pub async fn status(&self) -> Result<SchedulerStatus> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Status(reply))
            .map_err(|_| anyhow!("Scheduler is not running"))?;
        rx.await.map_err(|e| anyhow!("Failed to read scheduler status: {}", e))
    }

    /// Persist and stop; resolves once the loop has exited
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Shutdown(reply))
            .map_err(|_| anyhow!("Scheduler is not running"))?;
        rx.await.map_err(|e| anyhow!("Failed to shut down scheduler: {}", e))
    }
}

/// Run `scheduler` on its own task. Routed messages arrive on the returned receiver.
pub fn spawn(
    scheduler: Scheduler,
) -> (
    SchedulerHandle,
    mpsc::UnboundedReceiver<OutputMessage>,
    JoinHandle<()>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let join = tokio::spawn(run(scheduler, rx, out_tx));
    (SchedulerHandle { tx }, out_rx, join)
}

fn emit(outputs: &mpsc::UnboundedSender<OutputMessage>, messages: Vec<OutputMessage>) {
    for message in messages {
        if outputs.send(message).is_err() {
            debug!("Output receiver dropped, message discarded");
        }
    }
}

async fn run(
    mut scheduler: Scheduler,
    mut requests: mpsc::UnboundedReceiver<Request>,
    outputs: mpsc::UnboundedSender<OutputMessage>,
) {
    let mut clock = ClockMonitor::new();
    let mut check = tokio::time::interval(CHECK_INTERVAL);
    check.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Scheduler loop started ({})", scheduler.status());

    loop {
        let wait = scheduler
            .next_wakeup()
            .map(|at| (at - Utc::now()).to_std().unwrap_or_default())
            .unwrap_or(IDLE_WAIT)
            .min(IDLE_WAIT);

        tokio::select! {
            request = requests.recv() => match request {
                Some(Request::Input(input)) => {
                    emit(&outputs, scheduler.handle_input(&input, Utc::now()));
                }
                Some(Request::Status(reply)) => {
                    let _ = reply.send(scheduler.status());
                }
                Some(Request::Shutdown(reply)) => {
                    scheduler.shutdown();
                    let _ = reply.send(());
                    break;
                }
                None => {
                    scheduler.shutdown();
                    break;
                }
            },
            _ = tokio::time::sleep(wait) => {
                emit(&outputs, scheduler.tick(Utc::now()));
            }
            _ = check.tick() => {
                if clock.check().is_some() {
                    scheduler.on_clock_jump(Utc::now());
                }
            }
        }
    }
    info!("Scheduler loop exited");
}
