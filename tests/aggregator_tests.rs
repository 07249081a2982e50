// Aggregator tests: registration, counter-to-rate conversion, latest batches, broadcast

mod common;

use common::*;
use iostats::blacklist::Blacklist;
use iostats::check::IoCheck;
use iostats::engine;
use iostats::models::MetricKind;
use iostats::sink::{Aggregator, MetricsSink, SinkError, SinkProvider};
use std::sync::Arc;
use tokio::sync::broadcast;

fn aggregator(clock: &ManualClock) -> Aggregator {
    let (tx, _) = broadcast::channel(16);
    Aggregator::with_clock(tx, Arc::new(clock.clone()))
}

fn tags(device: &str) -> Vec<String> {
    vec![format!("device:{}", device)]
}

#[test]
fn unknown_check_has_no_sink() {
    let agg = aggregator(&ManualClock::at(0));
    match agg.sink("io") {
        Err(SinkError::UnknownCheck(id)) => assert_eq!(id, "io"),
        Ok(_) => panic!("expected UnknownCheck"),
    }
    agg.register("io");
    assert!(agg.sink("io").is_ok());
    agg.deregister("io");
    assert!(agg.sink("io").is_err());
}

#[test]
fn register_twice_returns_same_sender() {
    let agg = aggregator(&ManualClock::at(0));
    let a = agg.register("io");
    let b = agg.register("io");
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.check_id(), "io");
}

#[test]
fn gauges_pass_through_and_rates_need_two_commits() {
    let clock = ManualClock::at(10_000);
    let agg = aggregator(&clock);
    let sender = agg.register("io");

    sender.rate("system.io.r_s", 100.0, &tags("sda"));
    sender.gauge("system.io.util", 12.5, &tags("sda"));
    sender.commit();
    let first = agg.latest("io").unwrap();
    assert_eq!(first.timestamp_ms, 10_000);
    assert_eq!(first.points.len(), 1);
    assert_eq!(first.points[0].kind, MetricKind::Gauge);
    assert_eq!(first.points[0].value, 12.5);

    clock.advance(2_000);
    sender.rate("system.io.r_s", 150.0, &tags("sda"));
    sender.commit();
    let second = agg.latest("io").unwrap();
    let point = second.find("system.io.r_s", "device:sda").unwrap();
    assert_eq!(point.kind, MetricKind::Rate);
    assert_eq!(point.value, 25.0);
}

#[test]
fn rate_series_are_keyed_by_tags() {
    let clock = ManualClock::at(0);
    let agg = aggregator(&clock);
    let sender = agg.register("io");

    sender.rate("system.io.r_s", 10.0, &tags("sda"));
    sender.commit();
    clock.advance(1_000);
    sender.rate("system.io.r_s", 20.0, &tags("sda"));
    sender.rate("system.io.r_s", 500.0, &tags("sdb"));
    sender.commit();

    let batch = agg.latest("io").unwrap();
    assert_eq!(batch.find("system.io.r_s", "device:sda").unwrap().value, 10.0);
    assert!(batch.find("system.io.r_s", "device:sdb").is_none());
}

#[test]
fn decreasing_counter_yields_no_point_and_rebaselines() {
    let clock = ManualClock::at(0);
    let agg = aggregator(&clock);
    let sender = agg.register("io");

    sender.rate("system.io.w_s", 1000.0, &tags("sda"));
    sender.commit();
    clock.advance(1_000);
    sender.rate("system.io.w_s", 10.0, &tags("sda"));
    sender.commit();
    assert!(agg.latest("io").unwrap().points.is_empty());

    clock.advance(1_000);
    sender.rate("system.io.w_s", 30.0, &tags("sda"));
    sender.commit();
    let batch = agg.latest("io").unwrap();
    assert_eq!(batch.find("system.io.w_s", "device:sda").unwrap().value, 20.0);
}

#[test]
fn latest_all_is_sorted_by_check_id() {
    let agg = aggregator(&ManualClock::at(0));
    for id in ["zeta", "alpha", "mid"] {
        agg.register(id).commit();
    }
    let ids: Vec<_> = agg.latest_all().into_iter().map(|b| b.check_id).collect();
    assert_eq!(ids, ["alpha", "mid", "zeta"]);
    assert!(agg.latest("missing").is_none());
}

#[tokio::test]
async fn commit_broadcasts_batch() {
    let agg = aggregator(&ManualClock::at(42));
    let mut rx = agg.subscribe();
    let sender = agg.register("io");
    sender.gauge("system.io.await", 1.5, &tags("sda"));
    sender.commit();
    let batch = rx.recv().await.unwrap();
    assert_eq!(batch.check_id, "io");
    assert_eq!(batch.timestamp_ms, 42);
    assert_eq!(batch.points.len(), 1);
}

#[test]
fn check_cycles_through_aggregator_publish_per_second_rates() {
    let check_clock = ManualClock::at(1_000);
    let sink_clock = ManualClock::at(1_000);
    let agg = aggregator(&sink_clock);
    agg.register("io");

    let source = ScriptedSource::default();
    source.push(frame(&[device("sda", 100, 50, 1_048_576, 524_288, 200, 100, 300)]));
    source.push(frame(&[device("sda", 150, 70, 2_097_152, 1_048_576, 400, 180, 500)]));
    let mut check = IoCheck::with_clock("io", source, Blacklist::default(), check_clock.clone());

    check.run(&agg).unwrap();
    assert!(agg.latest("io").unwrap().points.is_empty());

    check_clock.advance(1_000);
    sink_clock.advance(1_000);
    check.run(&agg).unwrap();
    let batch = agg.latest("io").unwrap();
    let tag = "device:sda";
    assert_eq!(batch.find(engine::READS_PER_SEC, tag).unwrap().value, 50.0);
    assert_eq!(batch.find(engine::WRITES_PER_SEC, tag).unwrap().value, 20.0);
    assert_eq!(batch.find(engine::READ_KB_PER_SEC, tag).unwrap().value, 1024.0);
    assert_eq!(batch.find(engine::UTILIZATION, tag).unwrap().value, 20.0);
}

#[test]
fn vanished_series_rebaselines_when_device_returns() {
    let clock = ManualClock::at(0);
    let agg = aggregator(&clock);
    let sender = agg.register("io");

    sender.rate("system.io.r_s", 100.0, &tags("sdb"));
    sender.commit();

    // sdb unplugged for one cycle
    clock.advance(1_000);
    sender.rate("system.io.r_s", 5.0, &tags("sda"));
    sender.commit();

    // back with a much higher counter; no rate until a second sample
    clock.advance(1_000);
    sender.rate("system.io.r_s", 5_000.0, &tags("sdb"));
    sender.commit();
    assert!(agg.latest("io").unwrap().find("system.io.r_s", "device:sdb").is_none());

    clock.advance(1_000);
    sender.rate("system.io.r_s", 5_010.0, &tags("sdb"));
    sender.commit();
    let batch = agg.latest("io").unwrap();
    assert_eq!(batch.find("system.io.r_s", "device:sdb").unwrap().value, 10.0);
}
