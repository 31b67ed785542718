//! Run / stop / dispose for thread and reactor performers.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sourced_dispatch::channel::{AsyncChannel, Channel, InMemoryBus, InMemoryChannel};
use sourced_dispatch::mapper::JsonMessageMapper;
use sourced_dispatch::message::MessageType;
use sourced_dispatch::performer::{Performer, PerformerChannel};
use sourced_dispatch::processor::CommandProcessor;
use sourced_dispatch::pump::{PumpError, ReactorPump, ThreadPump};
use sourced_dispatch::subscription::MessagePumpType;
use tokio::runtime::Runtime;

use crate::support::{init_tracing, order_placed, pump_settings, wait_for, OrderPlaced, Recorder, ORDERS};

fn recording(recorder: &Recorder) -> CommandProcessor {
    let recorder = recorder.clone();
    CommandProcessor::new().handle::<OrderPlaced, _>(move |event| {
        recorder.record(&event.id);
        Ok(())
    })
}

fn thread_performer(channel: &Arc<InMemoryChannel>, processor: CommandProcessor) -> Performer {
    let blocking: Arc<dyn Channel> = channel.clone();
    let pump = ThreadPump::new(
        pump_settings(-1),
        blocking.clone(),
        Arc::new(JsonMessageMapper::<OrderPlaced>::new()),
        Arc::new(processor),
    );
    Performer::new(PerformerChannel::Blocking(blocking), Box::new(pump))
}

fn reactor_performer(
    runtime: &Runtime,
    channel: &Arc<InMemoryChannel>,
    processor: CommandProcessor,
) -> Performer {
    let suspending: Arc<dyn AsyncChannel> = channel.clone();
    let pump = ReactorPump::new(
        pump_settings(-1),
        suspending.clone(),
        Arc::new(JsonMessageMapper::<OrderPlaced>::new()),
        Arc::new(processor),
        runtime.handle().clone(),
    );
    Performer::new(PerformerChannel::Async(suspending), Box::new(pump))
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

// ============================================================================
// Thread performer
// ============================================================================

#[test]
fn stop_right_after_run_completes_cleanly() {
    init_tracing();
    let bus = InMemoryBus::new();
    let channel = Arc::new(bus.channel(ORDERS, ORDERS));
    channel.enqueue(vec![order_placed("o-1"), order_placed("o-2"), order_placed("o-3")]);

    let recorder = Recorder::new();
    let mut performer = thread_performer(&channel, recording(&recorder));
    assert_eq!(performer.pump_type(), MessagePumpType::Thread);

    let job = performer.run().unwrap();
    performer.stop();

    let stats = job.wait().expect("job should complete, not fault");
    assert_eq!(stats.dispatched, 3);
    assert_eq!(recorder.count(), 3);
    assert!(channel.is_empty());
    assert!(job.is_finished());

    performer.dispose();
    assert!(channel.is_disposed());
}

#[test]
fn stop_unblocks_idle_receive() {
    let bus = InMemoryBus::new();
    let channel = Arc::new(bus.channel(ORDERS, ORDERS));

    let mut performer = thread_performer(&channel, recording(&Recorder::new()));
    let job = performer.run().unwrap();
    thread::sleep(Duration::from_millis(30));

    let started = Instant::now();
    performer.stop();
    assert!(job.wait_timeout(Duration::from_secs(5)).unwrap().is_ok());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn messages_sent_while_running_are_handled() {
    let bus = InMemoryBus::new();
    let channel = Arc::new(bus.channel(ORDERS, ORDERS));

    let recorder = Recorder::new();
    let mut performer = thread_performer(&channel, recording(&recorder));
    let job = performer.run().unwrap();

    bus.send(ORDERS, order_placed("o-1"));
    bus.send(ORDERS, order_placed("o-2"));
    assert!(wait_for(Duration::from_secs(5), || recorder.count() == 2));

    performer.stop();
    assert_eq!(job.wait().unwrap().dispatched, 2);
}

#[test]
fn fatal_error_faults_job() {
    let bus = InMemoryBus::new();
    let channel = Arc::new(bus.channel(ORDERS, ORDERS));
    let mut mismatched = order_placed("o-1");
    mismatched.header.message_type = MessageType::Command;
    channel.enqueue(vec![mismatched]);

    let mut performer = thread_performer(&channel, recording(&Recorder::new()));
    let job = performer.run().unwrap();

    let outcome = job.wait();
    assert!(matches!(outcome, Err(PumpError::Configuration(_))));

    // Stop after a fault is harmless
    performer.stop();
    performer.dispose();
}

#[test]
fn panicking_handler_faults_job() {
    let bus = InMemoryBus::new();
    let channel = Arc::new(bus.channel(ORDERS, ORDERS));
    channel.enqueue(vec![order_placed("o-1")]);

    let processor = CommandProcessor::new().handle::<OrderPlaced, _>(|_| panic!("handler bug"));
    let mut performer = thread_performer(&channel, processor);
    let job = performer.run().unwrap();

    assert!(matches!(job.wait(), Err(PumpError::Aborted(_))));
}

#[test]
fn jobs_have_distinct_ids() {
    let bus = InMemoryBus::new();
    let a = Arc::new(bus.channel("a", ORDERS));
    let b = Arc::new(bus.channel("b", ORDERS));

    let mut first = thread_performer(&a, recording(&Recorder::new()));
    let mut second = thread_performer(&b, recording(&Recorder::new()));
    let job_a = first.run().unwrap();
    let job_b = second.run().unwrap();
    assert_ne!(job_a.id(), job_b.id());

    first.stop();
    second.stop();
    job_a.wait().unwrap();
    job_b.wait().unwrap();
}

// ============================================================================
// Reactor performer
// ============================================================================

#[test]
fn reactor_stop_right_after_run_completes_cleanly() {
    init_tracing();
    let runtime = runtime();
    let bus = InMemoryBus::new();
    let channel = Arc::new(bus.channel(ORDERS, ORDERS));
    channel.enqueue(vec![order_placed("o-1"), order_placed("o-2")]);

    let recorder = Recorder::new();
    let mut performer = reactor_performer(&runtime, &channel, recording(&recorder));
    assert_eq!(performer.pump_type(), MessagePumpType::Reactor);

    let job = performer.run().unwrap();
    performer.stop();

    let stats = job.wait().expect("job should complete, not fault");
    assert_eq!(stats.dispatched, 2);
    assert_eq!(recorder.count(), 2);
    assert!(channel.is_empty());
    performer.dispose();
}

#[test]
fn reactor_stop_unblocks_idle_receive() {
    let runtime = runtime();
    let bus = InMemoryBus::new();
    let channel = Arc::new(bus.channel(ORDERS, ORDERS));

    let mut performer = reactor_performer(&runtime, &channel, recording(&Recorder::new()));
    let job = performer.run().unwrap();
    thread::sleep(Duration::from_millis(30));

    performer.stop();
    assert!(job.wait_timeout(Duration::from_secs(5)).unwrap().is_ok());
}

#[test]
fn reactor_fatal_error_faults_job() {
    let runtime = runtime();
    let bus = InMemoryBus::new();
    let channel = Arc::new(bus.channel(ORDERS, ORDERS));
    let mut mismatched = order_placed("o-1");
    mismatched.header.message_type = MessageType::Command;
    channel.enqueue(vec![mismatched]);

    let mut performer = reactor_performer(&runtime, &channel, recording(&Recorder::new()));
    let job = performer.run().unwrap();

    assert!(matches!(job.wait(), Err(PumpError::Configuration(_))));
}
