//! Opening and shutting subscriptions while the dispatcher runs.

use std::time::Duration;

use sourced_dispatch::dispatcher::{Dispatcher, DispatcherError, DispatcherState};
use sourced_dispatch::subscription::Subscription;

use crate::support::{order_placed, wait_for, Recorder};
use crate::{in_memory, mappers, recording};

const WAIT: Duration = Duration::from_secs(5);

fn two_subscriptions(recorder: &Recorder) -> (sourced_dispatch::channel::InMemoryBus, Dispatcher) {
    let (bus, factory) = in_memory();
    let dispatcher = Dispatcher::builder()
        .processor(recording(recorder))
        .mappers(mappers())
        .subscription(Subscription::new("audit", "audit", "OrderPlaced", factory.clone()))
        .subscription(
            Subscription::new("billing", "billing", "OrderPlaced", factory).with_performers(2),
        )
        .build()
        .unwrap();
    (bus, dispatcher)
}

#[test]
fn shut_one_subscription_leaves_the_other_running() {
    let recorder = Recorder::new();
    let (bus, dispatcher) = two_subscriptions(&recorder);
    dispatcher.start().unwrap();
    assert_eq!(dispatcher.consumer_count(), 3);

    let reports = dispatcher.shut_subscription("audit").unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].subscription, "audit");
    assert_eq!(dispatcher.consumer_count(), 2);
    assert_eq!(dispatcher.state(), DispatcherState::Running);
    // Still configured
    assert_eq!(dispatcher.subscriptions().len(), 2);

    bus.send("audit", order_placed("a-1"));
    bus.send("billing", order_placed("b-1"));
    assert!(wait_for(WAIT, || recorder.count_of("b-1") == 1));
    assert_eq!(recorder.count_of("a-1"), 0);
    assert_eq!(bus.len("audit"), 1);

    dispatcher.open_subscription("audit").unwrap();
    assert_eq!(dispatcher.consumer_count(), 3);
    assert!(wait_for(WAIT, || recorder.count_of("a-1") == 1));

    dispatcher.stop();
}

#[test]
fn shutting_every_subscription_stops_the_dispatcher() {
    let (_bus, dispatcher) = two_subscriptions(&Recorder::new());
    dispatcher.start().unwrap();

    dispatcher.shut_subscription("audit").unwrap();
    assert_eq!(dispatcher.state(), DispatcherState::Running);
    dispatcher.shut_subscription("billing").unwrap();
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    assert_eq!(dispatcher.consumer_count(), 0);

    dispatcher.open_subscription("billing").unwrap();
    assert_eq!(dispatcher.state(), DispatcherState::Running);
    assert_eq!(dispatcher.consumer_count(), 2);
    dispatcher.stop();
}

#[test]
fn open_subscription_before_start_runs_only_that_subscription() {
    let (_bus, dispatcher) = two_subscriptions(&Recorder::new());

    dispatcher.open_subscription("billing").unwrap();
    assert_eq!(dispatcher.state(), DispatcherState::Running);
    assert_eq!(dispatcher.consumer_count(), 2);
    assert!(dispatcher.consumers().iter().all(|c| c.subscription == "billing"));

    // start() fills in the rest without touching billing
    dispatcher.start().unwrap();
    assert_eq!(dispatcher.consumer_count(), 3);
    dispatcher.stop();
}

#[test]
fn open_running_subscription_is_a_no_op() {
    let (_bus, dispatcher) = two_subscriptions(&Recorder::new());
    dispatcher.start().unwrap();
    let before: Vec<_> = dispatcher.consumers().into_iter().map(|c| c.name).collect();

    dispatcher.open_subscription("billing").unwrap();
    let after: Vec<_> = dispatcher.consumers().into_iter().map(|c| c.name).collect();
    assert_eq!(before, after);
    dispatcher.stop();
}

#[test]
fn unknown_subscription_is_reported() {
    let (_bus, dispatcher) = two_subscriptions(&Recorder::new());

    assert!(matches!(
        dispatcher.open_subscription("shipping"),
        Err(DispatcherError::SubscriptionNotFound(name)) if name == "shipping"
    ));
    assert!(matches!(
        dispatcher.shut_subscription("shipping"),
        Err(DispatcherError::SubscriptionNotFound(_))
    ));
    assert_eq!(dispatcher.state(), DispatcherState::Awaiting);
}

#[test]
fn status_compares_configured_and_running() {
    let (_bus, dispatcher) = two_subscriptions(&Recorder::new());

    let status = dispatcher.status();
    assert_eq!(status.len(), 2);
    assert!(status.iter().all(|s| s.running() == 0 && !s.is_open()));

    dispatcher.start().unwrap();
    let status = dispatcher.status();
    let billing = status.iter().find(|s| s.name == "billing").unwrap();
    assert_eq!(billing.configured_performers, 2);
    assert_eq!(billing.running(), 2);
    assert!(billing.is_open());

    dispatcher.shut_subscription("billing").unwrap();
    let status = dispatcher.status();
    let billing = status.iter().find(|s| s.name == "billing").unwrap();
    assert!(billing.consumers.is_empty());
    assert!(!billing.is_open());

    dispatcher.stop();
}

#[test]
fn consumers_have_unique_names_and_jobs() {
    let (_bus, dispatcher) = two_subscriptions(&Recorder::new());
    dispatcher.start().unwrap();

    let consumers = dispatcher.consumers();
    for (i, a) in consumers.iter().enumerate() {
        assert!(a.name.starts_with(&format!("{}-", a.subscription)));
        assert!(a.job.is_some());
        for b in &consumers[i + 1..] {
            assert_ne!(a.name, b.name);
            assert_ne!(a.job, b.job);
        }
    }
    dispatcher.stop();
}

#[test]
fn competing_consumers_share_one_queue() {
    let recorder = Recorder::new();
    let (bus, dispatcher) = two_subscriptions(&recorder);
    dispatcher.start().unwrap();

    for i in 0..20 {
        bus.send("billing", order_placed(&format!("b-{i}")));
    }
    assert!(wait_for(WAIT, || recorder.count() == 20));
    // Each message handled once across both billing consumers
    assert!((0..20).all(|i| recorder.count_of(&format!("b-{i}")) == 1));

    dispatcher.stop();
}

#[test]
fn subscriptions_sharing_a_routing_key_are_controlled_independently() {
    let (bus, factory) = in_memory();
    let recorder = Recorder::new();
    let dispatcher = Dispatcher::builder()
        .processor(recording(&recorder))
        .mappers(mappers())
        .subscription(Subscription::new("first", "shared", "OrderPlaced", factory.clone()))
        .subscription(
            Subscription::new("second", "shared", "OrderPlaced", factory).with_performers(2),
        )
        .build()
        .unwrap();
    dispatcher.start().unwrap();

    dispatcher.shut_subscription("first").unwrap();
    assert_eq!(dispatcher.state(), DispatcherState::Running);
    assert!(dispatcher.consumers().iter().all(|c| c.subscription == "second"));

    // The remaining subscription still drains the shared queue
    bus.send("shared", order_placed("s-1"));
    assert!(wait_for(WAIT, || recorder.count_of("s-1") == 1));

    dispatcher.shut_subscription("second").unwrap();
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    assert_eq!(dispatcher.consumer_count(), 0);
    assert_eq!(dispatcher.subscriptions().len(), 2);

    dispatcher.open_subscription("second").unwrap();
    assert_eq!(dispatcher.consumer_count(), 2);
    assert_eq!(dispatcher.state(), DispatcherState::Running);
    dispatcher.stop();
}
