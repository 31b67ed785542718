//! Start / stop, consumers that exit on their own, and reactor subscriptions.

use std::time::Duration;

use sourced_dispatch::dispatcher::{Dispatcher, DispatcherState};
use sourced_dispatch::message::Message;
use sourced_dispatch::processor::CommandProcessor;
use sourced_dispatch::pump::PumpError;
use sourced_dispatch::subscription::{MessagePumpType, Subscription};

use crate::support::{init_tracing, order_placed, place_order, wait_for, OrderPlaced, Recorder, ORDERS};
use crate::{in_memory, mappers, recording};

const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Start and stop
// ============================================================================

#[test]
fn start_then_stop_walks_the_state_machine() {
    init_tracing();
    let (bus, factory) = in_memory();
    let recorder = Recorder::new();
    let dispatcher = Dispatcher::builder()
        .processor(recording(&recorder))
        .mappers(mappers())
        .subscription(
            Subscription::new("orders", ORDERS, "OrderPlaced", factory)
                .with_performers(2)
                .with_timeout(Duration::from_millis(50)),
        )
        .build()
        .unwrap();

    assert_eq!(dispatcher.state(), DispatcherState::Awaiting);
    assert_eq!(dispatcher.consumer_count(), 0);

    dispatcher.start().unwrap();
    assert_eq!(dispatcher.state(), DispatcherState::Running);
    assert_eq!(dispatcher.consumer_count(), 2);

    for i in 0..5 {
        bus.send(ORDERS, order_placed(&format!("o-{i}")));
    }
    assert!(wait_for(WAIT, || bus.acknowledged(ORDERS).len() == 5));

    let reports = dispatcher.stop();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| matches!(r.outcome, Some(Ok(_)))));
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    assert_eq!(dispatcher.consumer_count(), 0);
    assert_eq!(recorder.count(), 5);
    assert!(bus.is_empty(ORDERS));
}

#[test]
fn preloaded_message_is_drained_by_stop() {
    let (bus, factory) = in_memory();
    bus.send(ORDERS, order_placed("o-1"));

    let recorder = Recorder::new();
    let dispatcher = Dispatcher::builder()
        .processor(recording(&recorder))
        .mappers(mappers())
        .subscription(Subscription::new("orders", ORDERS, "OrderPlaced", factory))
        .build()
        .unwrap();

    assert_eq!(dispatcher.state(), DispatcherState::Awaiting);
    dispatcher.start().unwrap();
    assert_eq!(dispatcher.state(), DispatcherState::Running);

    // Stop lets the pump finish what was queued before it
    dispatcher.stop();
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    assert_eq!(recorder.ids(), vec!["o-1".to_string()]);
    assert!(bus.is_empty(ORDERS));
}

#[test]
fn start_twice_does_not_duplicate_consumers() {
    let (_bus, factory) = in_memory();
    let dispatcher = Dispatcher::builder()
        .processor(recording(&Recorder::new()))
        .mappers(mappers())
        .subscription(Subscription::new("orders", ORDERS, "OrderPlaced", factory).with_performers(3))
        .build()
        .unwrap();

    dispatcher.start().unwrap();
    dispatcher.start().unwrap();
    assert_eq!(dispatcher.consumer_count(), 3);

    dispatcher.stop();
}

#[test]
fn restart_after_stop() {
    let (bus, factory) = in_memory();
    let recorder = Recorder::new();
    let dispatcher = Dispatcher::builder()
        .processor(recording(&recorder))
        .mappers(mappers())
        .subscription(Subscription::new("orders", ORDERS, "OrderPlaced", factory))
        .build()
        .unwrap();

    dispatcher.start().unwrap();
    dispatcher.stop();
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);

    // Sent while stopped: waits on the queue
    bus.send(ORDERS, order_placed("o-1"));
    assert_eq!(bus.len(ORDERS), 1);

    dispatcher.start().unwrap();
    assert_eq!(dispatcher.state(), DispatcherState::Running);
    assert!(wait_for(WAIT, || recorder.count() == 1));

    dispatcher.stop();
}

#[test]
fn stop_before_start_is_harmless() {
    let (_bus, factory) = in_memory();
    let dispatcher = Dispatcher::builder()
        .processor(recording(&Recorder::new()))
        .mappers(mappers())
        .subscription(Subscription::new("orders", ORDERS, "OrderPlaced", factory))
        .build()
        .unwrap();

    assert!(dispatcher.stop().is_empty());
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
}

#[test]
fn dropping_a_running_dispatcher_stops_its_pumps() {
    let (bus, factory) = in_memory();
    let dispatcher = Dispatcher::builder()
        .processor(recording(&Recorder::new()))
        .mappers(mappers())
        .subscription(Subscription::new("orders", ORDERS, "OrderPlaced", factory))
        .build()
        .unwrap();

    dispatcher.start().unwrap();
    drop(dispatcher);

    // The pump has been told to quit; later messages stay queued
    std::thread::sleep(Duration::from_millis(400));
    bus.send(ORDERS, order_placed("late"));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(bus.len(ORDERS), 1);
}

// ============================================================================
// Jobs that end on their own
// ============================================================================

#[test]
fn consumer_that_saw_quit_is_removed_automatically() {
    let (bus, factory) = in_memory();
    let dispatcher = Dispatcher::builder()
        .processor(recording(&Recorder::new()))
        .mappers(mappers())
        .subscription(Subscription::new("orders", ORDERS, "OrderPlaced", factory))
        .build()
        .unwrap();

    dispatcher.start().unwrap();
    bus.send(ORDERS, Message::quit(ORDERS));

    // Nobody asks for a reap: the supervisor removes the consumer
    assert!(wait_for(WAIT, || dispatcher.state() == DispatcherState::Stopped));
    assert_eq!(dispatcher.consumer_count(), 0);
    assert!(dispatcher.status()[0].consumers.is_empty());

    let reports = dispatcher.reap_finished();
    assert_eq!(reports.len(), 1);
    assert!(matches!(reports[0].outcome, Some(Ok(_))));
    assert!(dispatcher.reap_finished().is_empty());

    // Reopening replaces the finished consumer
    dispatcher.open_subscription("orders").unwrap();
    assert_eq!(dispatcher.consumer_count(), 1);
    assert_eq!(dispatcher.state(), DispatcherState::Running);
    dispatcher.stop();
}

#[test]
fn one_exited_consumer_leaves_the_rest_running() {
    let (bus, factory) = in_memory();
    let recorder = Recorder::new();
    let dispatcher = Dispatcher::builder()
        .processor(recording(&recorder))
        .mappers(mappers())
        .subscription(
            Subscription::new("orders", ORDERS, "OrderPlaced", factory)
                .with_performers(2)
                .with_timeout(Duration::from_millis(50)),
        )
        .build()
        .unwrap();

    dispatcher.start().unwrap();
    bus.send(ORDERS, Message::quit(ORDERS));

    assert!(wait_for(WAIT, || dispatcher.consumer_count() == 1));
    assert_eq!(dispatcher.state(), DispatcherState::Running);
    assert_eq!(dispatcher.status()[0].running(), 1);

    // The survivor still consumes
    bus.send(ORDERS, order_placed("o-1"));
    assert!(wait_for(WAIT, || recorder.count() == 1));

    let reports = dispatcher.stop();
    assert_eq!(reports.len(), 1);
    assert_eq!(dispatcher.reap_finished().len(), 1);
}

#[test]
fn missing_handler_faults_consumer() {
    let (bus, factory) = in_memory();
    let dispatcher = Dispatcher::builder()
        .processor(CommandProcessor::new())
        .mappers(mappers())
        .subscription(Subscription::new("commands", "commands", "PlaceOrder", factory))
        .build()
        .unwrap();

    dispatcher.start().unwrap();
    let mut command = place_order("c-1");
    command.header.topic = "commands".to_string();
    bus.send("commands", command);

    assert!(wait_for(WAIT, || dispatcher.state() == DispatcherState::Stopped));
    let reports = dispatcher.reap_finished();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_faulted());
    assert!(matches!(
        reports[0].outcome,
        Some(Err(PumpError::Configuration(_)))
    ));
    assert_eq!(bus.rejected("commands").len(), 1);
}

#[test]
fn unacceptable_limit_ends_consumer() {
    let (bus, factory) = in_memory();
    let dispatcher = Dispatcher::builder()
        .processor(recording(&Recorder::new()))
        .mappers(mappers())
        .subscription(
            Subscription::new("orders", ORDERS, "OrderPlaced", factory)
                .with_unacceptable_message_limit(2),
        )
        .build()
        .unwrap();

    dispatcher.start().unwrap();
    bus.send_batch(
        ORDERS,
        vec![
            crate::support::poison("bad-1"),
            crate::support::poison("bad-2"),
            order_placed("o-1"),
        ],
    );

    assert!(wait_for(WAIT, || dispatcher.consumer_count() == 0));
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    let reports = dispatcher.reap_finished();
    let stats = match &reports[0].outcome {
        Some(Ok(stats)) => stats.clone(),
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(stats.unacceptable, 2);
    assert_eq!(bus.len(ORDERS), 1);
}

// ============================================================================
// Reactor subscriptions
// ============================================================================

#[test]
fn reactor_subscription_runs_on_owned_runtime() {
    init_tracing();
    let (bus, factory) = in_memory();
    let recorder = Recorder::new();
    let processor = {
        let recorder = recorder.clone();
        CommandProcessor::new().handle_async::<OrderPlaced, _, _>(move |event| {
            let recorder = recorder.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                recorder.record(&event.id);
                Ok(())
            }
        })
    };

    let dispatcher = Dispatcher::builder()
        .processor(processor)
        .mappers(mappers())
        .reactor_threads(2)
        .subscription(
            Subscription::new("orders", ORDERS, "OrderPlaced", factory)
                .with_performers(2)
                .with_pump_type(MessagePumpType::Reactor)
                .with_timeout(Duration::from_millis(50)),
        )
        .build()
        .unwrap();

    dispatcher.start().unwrap();
    assert!(dispatcher
        .consumers()
        .iter()
        .all(|c| c.pump_type == MessagePumpType::Reactor));

    for i in 0..4 {
        bus.send(ORDERS, order_placed(&format!("o-{i}")));
    }
    assert!(wait_for(WAIT, || recorder.count() == 4));

    let reports = dispatcher.stop();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| !r.is_faulted()));
}

#[test]
fn mixed_pump_types_share_a_processor() {
    let (bus, factory) = in_memory();
    let recorder = Recorder::new();
    let dispatcher = Dispatcher::builder()
        .processor(recording(&recorder))
        .mappers(mappers())
        .reactor_threads(1)
        .subscription(Subscription::new("threaded", "threaded", "OrderPlaced", factory.clone()))
        .subscription(
            Subscription::new("reactive", "reactive", "OrderPlaced", factory)
                .with_pump_type(MessagePumpType::Reactor),
        )
        .build()
        .unwrap();

    dispatcher.start().unwrap();
    bus.send("threaded", order_placed("t-1"));
    bus.send("reactive", order_placed("r-1"));
    assert!(wait_for(WAIT, || recorder.count() == 2));
    assert_eq!(recorder.count_of("t-1"), 1);
    assert_eq!(recorder.count_of("r-1"), 1);

    dispatcher.stop();
}
