//! 读写周期端到端测试（内存设备）

use crossbeam_channel::Receiver;
use pollbatch_driver::mock::MockTransport;
use pollbatch_driver::{EventRecorder, RecordedEvent};
use pollbatch_sdk::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn ts(micros: u64) -> Timestamp {
    Timestamp::from_micros(micros)
}

struct Fixture {
    batch: IoBatch<Arc<MockTransport>>,
    transport: Arc<MockTransport>,
    p: Arc<Input<f64>>,
    q: Arc<Input<u16>>,
    a: Arc<Output<u16>>,
    b: Arc<Output<i32>>,
    sp: Arc<Output<u16>>,
}

/// p: f64@0, q: u16@8, a: u16@16, b: i32@20, sp: u16@24（回读）
fn fixture() -> Fixture {
    let mut builder = IoBatchBuilder::new("plc");
    let p = builder.add_input::<f64>("p", 0).unwrap();
    let q = builder.add_input::<u16>("q", 8).unwrap();
    let a = builder.add_output::<u16>("a", 16).unwrap();
    let b = builder.add_output::<i32>("b", 20).unwrap();
    let sp = builder.add_readback_output::<u16>("sp", 24).unwrap();
    let transport = Arc::new(MockTransport::new(32));
    let batch = builder.build(Arc::clone(&transport));
    Fixture {
        batch,
        transport,
        p,
        q,
        a,
        b,
        sp,
    }
}

fn record(batch: &IoBatch<Arc<MockTransport>>) -> Receiver<RecordedEvent> {
    let (recorder, rx) = EventRecorder::new();
    batch.add_hook(Arc::new(recorder));
    rx
}

fn drain(rx: &Receiver<RecordedEvent>) -> Vec<(String, &'static str)> {
    rx.try_iter().map(|e| (e.owner.to_string(), e.name)).collect()
}

fn ev(owner: &str, name: &'static str) -> (String, &'static str) {
    (owner.to_string(), name)
}

#[test]
fn test_not_operational_invalidates_every_input() {
    let f = fixture();
    f.transport.set_value(0, &1.0f64);
    f.batch.read(ts(1));
    assert_eq!(f.p.value(), 1.0);
    let rx = record(&f.batch);

    f.transport.set_operational(false);
    let report = f.batch.read(ts(2));

    assert_eq!(report.outcome, Err(IoError::NotConnected));
    assert_eq!(f.transport.read_calls(), 1);

    let common = f.batch.common_state();
    assert_eq!(common.quality, Quality::Bad);
    assert_eq!(common.error, IoError::NotConnected.code());
    assert_eq!(common.update_time, ts(2));

    assert_eq!(f.p.value(), 0.0);
    assert_eq!(f.q.value(), 0);
    assert_eq!(f.sp.readback_value(), Some(0));

    let events = drain(&rx);
    assert_eq!(events[0], ev("plc", "read"));
    assert_eq!(events[1], ev("plc", "quality"));
    // 只有 p 的值真正变了
    assert!(events.contains(&ev("p", "value")));
    assert!(!events.contains(&ev("q", "value")));
    // 质量变化让每个输入都报告 changed
    for point in ["p", "q", "sp"] {
        assert!(events.contains(&ev(point, "changed")), "{} missing changed", point);
    }
    assert_eq!(f.p.record().change_time, ts(2));
}

#[test]
fn test_decoded_value_change_fires_events_in_order() {
    let f = fixture();
    f.transport.set_value(0, &1.0f64);
    f.batch.read(ts(1));
    let rx = record(&f.batch);

    f.transport.set_value(0, &3.5f64);
    f.batch.read(ts(2));

    assert_eq!(f.p.value(), 3.5);
    assert_eq!(f.p.record().change_time, ts(2));
    assert_eq!(f.q.record().change_time, ts(1));
    assert_eq!(
        drain(&rx),
        vec![ev("plc", "read"), ev("p", "value"), ev("p", "changed")]
    );
}

#[test]
fn test_recovery_from_bad_quality_fires_quality_event() {
    let f = fixture();
    f.transport.fail_reads(Some(IoError::Transport(7)));
    f.batch.read(ts(1));
    assert_eq!(f.batch.common_state().error, IoError::Transport(7).code());
    let rx = record(&f.batch);

    f.transport.fail_reads(None);
    f.transport.set_value(0, &3.5f64);
    f.batch.read(ts(2));

    let events = drain(&rx);
    assert_eq!(&events[..4], &[
        ev("plc", "read"),
        ev("plc", "quality"),
        ev("p", "value"),
        ev("p", "changed"),
    ]);
    assert!(events.contains(&ev("q", "changed")));
    assert!(f.batch.common_state().quality.is_good());
}

#[test]
fn test_output_without_pending_value_is_untouched() {
    let f = fixture();
    let rx = record(&f.batch);

    f.a.write_value(0x1234);
    let report = f.batch.write(ts(5));

    assert_eq!(report.outputs, 1);
    let fragments = f.transport.last_write().unwrap();
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].offset, 16);
    assert_eq!(fragments[0].as_bytes(), &[0x12, 0x34]);

    assert_eq!(f.a.last_write().write_time, ts(5));
    assert_eq!(f.b.last_write(), WriteRecord::default());
    assert_eq!(f.sp.last_write(), WriteRecord::default());
    assert_eq!(drain(&rx), vec![ev("plc", "written"), ev("a", "written")]);
}

#[test]
fn test_write_coalescing_keeps_latest_value() {
    let f = fixture();
    f.batch.read(ts(1));
    let rx = record(&f.batch);

    f.sp.write_value(1);
    f.sp.write_value(2);
    f.batch.write(ts(2));
    f.batch.read(ts(3));

    let written = f.transport.written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].len(), 1);
    assert_eq!(f.transport.value::<u16>(24), Ok(2));
    assert_eq!(f.sp.readback_value(), Some(2));
    assert_eq!(f.batch.metrics().snapshot().writes_coalesced, 1);

    let events = drain(&rx);
    let value_events = events.iter().filter(|e| **e == ev("sp", "value")).count();
    let changed_events = events.iter().filter(|e| **e == ev("sp", "changed")).count();
    assert_eq!(value_events, 1);
    assert_eq!(changed_events, 1);

    // 队列已清空，下一个写周期是空周期
    assert!(f.batch.write(ts(4)).is_idle());
}

#[test]
fn test_identical_read_fires_only_read_event() {
    let f = fixture();
    f.transport.set_value(0, &2.25f64);
    f.transport.set_value(8, &9u16);
    f.batch.read(ts(1));
    let before = f.p.record();
    let rx = record(&f.batch);

    let report = f.batch.read(ts(2));

    assert!(!report.changes.any());
    assert_eq!(drain(&rx), vec![ev("plc", "read")]);
    assert_eq!(f.p.record(), before);
    assert_eq!(f.batch.common_state().update_time, ts(2));
}

#[test]
fn test_write_failure_is_recorded() {
    let f = fixture();
    let rx = record(&f.batch);
    f.transport.fail_writes(Some(IoError::Transport(9)));

    f.b.write_value(-5);
    let report = f.batch.write(ts(3));

    assert_eq!(report.outcome, Some(Err(IoError::Transport(9))));
    assert_eq!(f.b.last_write().write_error, IoError::Transport(9).code());
    assert_eq!(f.b.last_write().write_time, ts(3));
    assert_eq!(f.batch.last_write().write_error, IoError::Transport(9).code());
    assert_eq!(drain(&rx), vec![ev("plc", "writeError"), ev("b", "writeError")]);
    // 写失败不重试，值已经丢弃
    assert!(f.batch.write(ts(4)).is_idle());
    assert_eq!(f.batch.metrics().snapshot().write_errors, 1);
}

#[test]
fn test_short_payload_decodes_to_default() {
    let f = fixture();
    f.transport.set_value(0, &4.0f64);
    f.batch.read(ts(1));
    assert_eq!(f.p.value(), 4.0);

    // 设备只返回 4 个字节：批次读取成功，但各点解码失败
    f.transport.resize(4);
    let report = f.batch.read(ts(2));

    assert_eq!(report.outcome, Ok(()));
    assert!(f.batch.common_state().quality.is_good());
    assert_eq!(f.p.value(), 0.0);
    assert_eq!(f.p.record().change_time, ts(2));
}

#[test]
fn test_read_handles_and_subscriptions() {
    struct Counter(AtomicUsize);

    impl EventCallback for Counter {
        fn on_event(&self, event: &FiredEvent<'_>) {
            assert_eq!(event.name, "changed");
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    let f = fixture();
    let counter = Arc::new(Counter(AtomicUsize::new(0)));
    let changed = f.batch.find_event("p/changed").unwrap();
    f.batch.subscribe(changed, counter.clone());

    let p = f.batch.point("p").unwrap();
    let value = p.resolve_attribute("value").unwrap();
    assert!(!value.is_writable());
    let handle = p.read_handle(&value).unwrap();
    let quality = f.batch.read_handle(&f.batch.resolve_attribute("quality").unwrap()).unwrap();

    assert_eq!(quality.read(), Ok(DataValue::Quality(Quality::Bad)));

    f.transport.set_value(0, &6.5f64);
    f.batch.read(ts(1));
    f.batch.read(ts(2));

    assert_eq!(handle.read(), Ok(DataValue::F64(6.5)));
    assert_eq!(quality.read(), Ok(DataValue::Quality(Quality::Good)));
    assert_eq!(counter.0.load(Ordering::Relaxed), 1);
}

#[test]
fn test_dynamic_write_by_name() {
    let f = fixture();
    f.batch.write_value("b", DataValue::I32(-1)).unwrap();
    assert!(matches!(
        f.batch.write_value("b", DataValue::U16(1)),
        Err(DriverError::TypeMismatch { .. })
    ));
    assert!(matches!(
        f.batch.write_value("p", DataValue::F64(1.0)),
        Err(DriverError::NotWritable(_))
    ));

    f.batch.write(ts(1));
    assert_eq!(f.transport.value::<i32>(20), Ok(-1));
}
