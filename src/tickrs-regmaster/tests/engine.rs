mod common;

use std::sync::Mutex;

use common::{run_bus, MockI2c, MockSpi, Op, Wire};
use tickrs_regmaster::{
    BusEvent, Direction, Error, I2cRegMaster, Mode, RegMaster, SpiRegMaster, Transaction,
};
use tickrs_tasks::{Scheduler, Signal, TaskContext, TickResult};

type Log = Mutex<Vec<(Option<u8>, bool)>>;

fn record(log: &Log, txn: &Transaction<'_>, terminated: bool) {
    log.lock().unwrap().push((txn.reg().first().copied(), terminated));
}

#[test]
fn test_write_two_register_bytes() {
    let wire = Wire::new();
    let done = Mutex::new(Vec::new());
    let on_done = |txn: Transaction<'_>, terminated: bool| {
        done.lock().unwrap().push((txn.reg_pos(), terminated));
    };
    let clock = || 0u32;
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let regmaster: I2cRegMaster<'_, MockI2c<'_>, 4> = RegMaster::over_i2c(MockI2c(&wire));
    regmaster.start(&scheduler).unwrap();
    let asr = regmaster.task().unwrap();
    assert_eq!(asr.signal(), Signal::Sleep);

    regmaster.write(0x48, &[0x03, 0x07], &on_done).unwrap();
    assert_eq!(asr.signal(), Signal::Pending);
    assert_eq!(regmaster.outstanding(), 1);

    scheduler.tick();
    assert_eq!(
        wire.ops(),
        [
            Op::WaitStop,
            Op::Address(0x48),
            Op::Mode(Mode::Transmit),
            Op::Start,
            Op::WaitStart,
            Op::Enable(Direction::Tx),
        ]
    );
    assert_eq!(asr.signal(), Signal::Sleep);
    wire.clear();

    regmaster.interrupt(BusEvent::TxReady);
    assert_eq!(regmaster.progress().map(|p| p.reg_pos), Some(1));
    assert_eq!(wire.ops(), [Op::Tx(0x03)]);
    assert_eq!(asr.signal(), Signal::Sleep);

    regmaster.interrupt(BusEvent::TxReady);
    assert_eq!(
        wire.ops(),
        [
            Op::Tx(0x03),
            Op::Tx(0x07),
            Op::Stop,
            Op::Disable(Direction::Tx),
        ]
    );
    assert_eq!(regmaster.pending_len(), 0);
    assert_eq!(regmaster.executing_len(), 1);
    assert_eq!(asr.signal(), Signal::Pending);
    // callbacks only run from the task
    assert!(done.lock().unwrap().is_empty());

    scheduler.tick();
    assert_eq!(*done.lock().unwrap(), [(2, false)]);
    assert_eq!(regmaster.outstanding(), 0);
    assert!(regmaster.is_idle());
    assert_eq!(asr.signal(), Signal::Sleep);
}

#[test]
fn test_swapped_read() {
    let wire = Wire::new();
    wire.answer(&[0xab, 0xcd]);
    let mut buf = [0u8; 2];
    let received = Mutex::new(Vec::new());
    let on_read = |txn: Transaction<'_>, terminated: bool| {
        let data = txn.into_wait().map(|wait| wait.to_vec());
        received.lock().unwrap().push((data, terminated));
    };
    let clock = || 0u32;
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let regmaster: I2cRegMaster<'_, MockI2c<'_>, 4> = RegMaster::over_i2c(MockI2c(&wire));
    regmaster.start(&scheduler).unwrap();
    let asr = regmaster.task().unwrap();

    regmaster
        .read_ext(0x48, &[0x01], &mut buf, &on_read, true)
        .unwrap();
    scheduler.tick();
    wire.clear();

    regmaster.interrupt(BusEvent::TxReady);
    assert_eq!(
        wire.ops(),
        [Op::Tx(0x01), Op::Stop, Op::Disable(Direction::Tx)]
    );
    assert_eq!(regmaster.progress().map(|p| p.state), Some(Direction::Rx));
    assert_eq!(asr.signal(), Signal::Pending);
    wire.clear();

    // the task arms reception
    scheduler.tick();
    assert_eq!(
        wire.ops(),
        [
            Op::WaitStop,
            Op::Mode(Mode::Receive),
            Op::Start,
            Op::WaitStart,
            Op::Enable(Direction::Rx),
        ]
    );
    wire.clear();

    regmaster.interrupt(BusEvent::RxReady);
    assert_eq!(wire.ops(), [Op::Stop, Op::Rx(0xab)]);
    regmaster.interrupt(BusEvent::RxReady);
    assert_eq!(
        wire.ops(),
        [
            Op::Stop,
            Op::Rx(0xab),
            Op::Rx(0xcd),
            Op::Disable(Direction::Rx),
            Op::Disable(Direction::Tx),
        ]
    );
    assert_eq!(regmaster.executing_len(), 1);

    scheduler.tick();
    assert_eq!(*received.lock().unwrap(), [(Some(vec![0xcd, 0xab]), false)]);
    assert_eq!(regmaster.outstanding(), 0);
}

#[test]
fn test_read_keeps_arrival_order() {
    let wire = Wire::new();
    wire.answer(&[1, 2, 3, 4]);
    let mut buf = [0u8; 4];
    let received = Mutex::new(None);
    let on_read = |txn: Transaction<'_>, _: bool| {
        *received.lock().unwrap() = txn.into_wait().map(|wait| wait.to_vec());
    };
    let clock = || 0u32;
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let regmaster: I2cRegMaster<'_, MockI2c<'_>, 4> = RegMaster::over_i2c(MockI2c(&wire));
    regmaster.start(&scheduler).unwrap();

    regmaster.read(0x48, &[0x10], &mut buf, &on_read).unwrap();
    scheduler.tick();
    run_bus(&wire, |event| regmaster.interrupt(event));
    scheduler.tick();
    wire.clear();
    run_bus(&wire, |event| regmaster.interrupt(event));

    // stop is issued while the last byte is still to come
    assert_eq!(
        wire.ops(),
        [
            Op::Rx(1),
            Op::Rx(2),
            Op::Stop,
            Op::Rx(3),
            Op::Rx(4),
            Op::Disable(Direction::Rx),
            Op::Disable(Direction::Tx),
        ]
    );
    scheduler.tick();
    assert_eq!(*received.lock().unwrap(), Some(vec![1, 2, 3, 4]));
}

#[test]
fn test_single_byte_read_stops_when_armed() {
    let wire = Wire::new();
    wire.answer(&[0x5a]);
    let mut buf = [0u8; 1];
    let received = Mutex::new(None);
    let on_read = |txn: Transaction<'_>, _: bool| {
        *received.lock().unwrap() = txn.wait().map(<[u8]>::to_vec);
    };
    let clock = || 0u32;
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let regmaster: I2cRegMaster<'_, MockI2c<'_>, 4> = RegMaster::over_i2c(MockI2c(&wire));
    regmaster.start(&scheduler).unwrap();

    regmaster.read(0x48, &[0x0f], &mut buf, &on_read).unwrap();
    scheduler.tick();
    run_bus(&wire, |event| regmaster.interrupt(event));
    wire.clear();

    scheduler.tick();
    assert_eq!(
        wire.ops(),
        [
            Op::WaitStop,
            Op::Mode(Mode::Receive),
            Op::Start,
            Op::WaitStart,
            Op::Stop,
            Op::Enable(Direction::Rx),
        ]
    );
    wire.clear();

    run_bus(&wire, |event| regmaster.interrupt(event));
    assert_eq!(
        wire.ops(),
        [
            Op::Rx(0x5a),
            Op::Disable(Direction::Rx),
            Op::Disable(Direction::Tx),
        ]
    );
    scheduler.tick();
    assert_eq!(*received.lock().unwrap(), Some(vec![0x5a]));
}

#[test]
fn test_transactions_complete_in_submission_order() {
    let wire = Wire::new();
    let log = Log::default();
    let on_done = |txn: Transaction<'_>, terminated: bool| record(&log, &txn, terminated);
    let clock = || 0u32;
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let regmaster: I2cRegMaster<'_, MockI2c<'_>, 4> = RegMaster::over_i2c(MockI2c(&wire));
    let chained = |txn: Transaction<'_>, terminated: bool| {
        record(&log, &txn, terminated);
        regmaster.write(0x48, &[0x30], &on_done).unwrap();
    };
    regmaster.start(&scheduler).unwrap();

    regmaster.write(0x48, &[0x10, 0x11], &chained).unwrap();
    regmaster.write(0x49, &[0x20], &on_done).unwrap();
    assert_eq!(regmaster.pending_len(), 2);

    for _ in 0..16 {
        scheduler.tick();
        run_bus(&wire, |event| regmaster.interrupt(event));
        if regmaster.is_idle() {
            break;
        }
    }

    assert!(regmaster.is_idle());
    assert_eq!(
        *log.lock().unwrap(),
        [(Some(0x10), false), (Some(0x20), false), (Some(0x30), false)]
    );
    assert_eq!(wire.sent(), [0x10, 0x11, 0x20, 0x30]);

    // the second transaction starts only after the first one stopped
    let ops = wire.ops();
    let first_stop = ops.iter().position(|op| *op == Op::Stop).unwrap();
    let second_address = ops.iter().position(|op| *op == Op::Address(0x49)).unwrap();
    assert!(first_stop < second_address);
}

#[test]
fn test_finalize_terminates_queued_and_completed() {
    let wire = Wire::new();
    let log = Log::default();
    let on_done = |txn: Transaction<'_>, terminated: bool| record(&log, &txn, terminated);
    let clock = || 0u32;
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let regmaster: I2cRegMaster<'_, MockI2c<'_>, 4> = RegMaster::over_i2c(MockI2c(&wire));
    regmaster.start(&scheduler).unwrap();
    let asr = regmaster.task().unwrap();
    let baseline = regmaster.outstanding();

    regmaster.write(0x48, &[0x10], &on_done).unwrap();
    regmaster.write(0x48, &[0x20], &on_done).unwrap();
    regmaster.write(0x48, &[0x30], &on_done).unwrap();
    scheduler.tick();
    run_bus(&wire, |event| regmaster.interrupt(event));
    assert_eq!(regmaster.executing_len(), 1);
    assert_eq!(regmaster.pending_len(), 2);
    assert_eq!(regmaster.outstanding(), baseline + 3);

    regmaster.finalize();
    assert!(!wire.tx_enabled());
    assert!(!wire.rx_enabled());
    assert_eq!(asr.signal(), Signal::Stop);
    assert_eq!(
        regmaster.write(0x48, &[0x40], &on_done),
        Err(Error::Terminated)
    );

    assert_eq!(scheduler.tick(), TickResult::Working);
    assert_eq!(
        *log.lock().unwrap(),
        [(Some(0x20), true), (Some(0x30), true), (Some(0x10), true)]
    );
    assert_eq!(regmaster.outstanding(), baseline);
    assert_eq!(scheduler.used_count(), 0);
    assert_eq!(wire.ops().last(), Some(&Op::Close));
    assert!(regmaster.task().is_none());
}

#[test]
fn test_finalize_mid_transfer_releases_bus() {
    let wire = Wire::new();
    let done = Mutex::new(Vec::new());
    let on_done = |txn: Transaction<'_>, terminated: bool| {
        done.lock().unwrap().push((txn.reg_pos(), terminated));
    };
    let clock = || 0u32;
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let regmaster: I2cRegMaster<'_, MockI2c<'_>, 4> = RegMaster::over_i2c(MockI2c(&wire));
    regmaster.start(&scheduler).unwrap();

    regmaster.write(0x48, &[1, 2, 3], &on_done).unwrap();
    scheduler.tick();
    regmaster.interrupt(BusEvent::TxReady);
    wire.clear();

    regmaster.finalize();
    assert_eq!(
        wire.ops(),
        [
            Op::Disable(Direction::Rx),
            Op::Disable(Direction::Tx),
            Op::Stop,
        ]
    );

    scheduler.tick();
    assert_eq!(*done.lock().unwrap(), [(1, true)]);
    assert_eq!(wire.ops().last(), Some(&Op::Close));
}

#[test]
fn test_late_event_after_finalize_is_ignored() {
    let wire = Wire::new();
    let log = Log::default();
    let on_done = |txn: Transaction<'_>, terminated: bool| record(&log, &txn, terminated);
    let clock = || 0u32;
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let regmaster: I2cRegMaster<'_, MockI2c<'_>, 4> = RegMaster::over_i2c(MockI2c(&wire));
    regmaster.start(&scheduler).unwrap();

    regmaster.write(0x48, &[1, 2, 3], &on_done).unwrap();
    scheduler.tick();
    regmaster.interrupt(BusEvent::TxReady);
    regmaster.finalize();
    wire.clear();

    // latched before interrupts were masked
    regmaster.interrupt(BusEvent::TxReady);
    assert!(wire.ops().is_empty());
    assert_eq!(regmaster.progress().map(|p| p.reg_pos), Some(1));

    scheduler.tick();
    assert_eq!(*log.lock().unwrap(), [(Some(1), true)]);
    assert!(wire.sent().is_empty());
    assert_eq!(wire.ops().last(), Some(&Op::Close));
}

#[test]
fn test_scheduler_shutdown_drains_engine() {
    let wire = Wire::new();
    let log = Log::default();
    let on_done = |txn: Transaction<'_>, terminated: bool| record(&log, &txn, terminated);
    let clock = || 0u32;
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let regmaster: I2cRegMaster<'_, MockI2c<'_>, 4> = RegMaster::over_i2c(MockI2c(&wire));
    regmaster.start(&scheduler).unwrap();

    regmaster.write(0x48, &[0x10], &on_done).unwrap();
    scheduler.finalize();

    assert_eq!(scheduler.tick(), TickResult::Stopped);
    assert_eq!(*log.lock().unwrap(), [(Some(0x10), true)]);
    assert_eq!(regmaster.outstanding(), 0);
    assert!(!wire.ops().contains(&Op::Tx(0x10)));
}

#[test]
fn test_spi_write_then_read() {
    let wire = Wire::new();
    wire.answer(&[0x12, 0x34]);
    let mut buf = [0u8; 2];
    let log = Log::default();
    let received = Mutex::new(None);
    let on_write = |txn: Transaction<'_>, terminated: bool| record(&log, &txn, terminated);
    let on_read = |txn: Transaction<'_>, terminated: bool| {
        record(&log, &txn, terminated);
        *received.lock().unwrap() = txn.into_wait().map(|wait| wait.to_vec());
    };
    let clock = || 0u32;
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let regmaster: SpiRegMaster<'_, MockSpi<'_>, 4> = RegMaster::over_spi(MockSpi(&wire));
    regmaster.start(&scheduler).unwrap();

    regmaster.write(0, &[0xa0, 0x01], &on_write).unwrap();
    regmaster.read(0, &[0x80], &mut buf, &on_read).unwrap();
    for _ in 0..8 {
        scheduler.tick();
        run_bus(&wire, |event| regmaster.interrupt(event));
    }

    assert_eq!(
        wire.ops(),
        [
            Op::Select,
            Op::Enable(Direction::Tx),
            Op::Tx(0xa0),
            Op::Tx(0x01),
            Op::Deselect,
            Op::Disable(Direction::Tx),
            Op::Select,
            Op::Enable(Direction::Tx),
            Op::Tx(0x80),
            Op::Disable(Direction::Tx),
            Op::Enable(Direction::Rx),
            Op::Rx(0x12),
            Op::Rx(0x34),
            Op::Deselect,
            Op::Disable(Direction::Rx),
            Op::Disable(Direction::Tx),
        ]
    );
    assert_eq!(*log.lock().unwrap(), [(Some(0xa0), false), (Some(0x80), false)]);
    assert_eq!(*received.lock().unwrap(), Some(vec![0x12, 0x34]));
}

#[test]
fn test_submissions_before_start_are_kept() {
    let wire = Wire::new();
    let log = Log::default();
    let on_done = |txn: Transaction<'_>, terminated: bool| record(&log, &txn, terminated);
    let clock = || 0u32;
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let regmaster: I2cRegMaster<'_, MockI2c<'_>, 4> = RegMaster::over_i2c(MockI2c(&wire));

    regmaster.write(0x48, &[0x10], &on_done).unwrap();
    assert!(regmaster.task().is_none());

    regmaster.start(&scheduler).unwrap();
    assert_eq!(regmaster.task().map(|asr| asr.signal()), Some(Signal::Pending));
    // starting again is a no-op
    regmaster.start(&scheduler).unwrap();
    assert_eq!(scheduler.used_count(), 1);

    scheduler.tick();
    run_bus(&wire, |event| regmaster.interrupt(event));
    scheduler.tick();
    assert_eq!(*log.lock().unwrap(), [(Some(0x10), false)]);
}

#[test]
fn test_start_fails_without_task_slot() {
    let wire = Wire::new();
    let clock = || 0u32;
    let busy = |_: &mut TaskContext<'_>| {};
    let scheduler: Scheduler<'_, 1> = Scheduler::new(&clock);
    scheduler.create("busy", &busy, 10).unwrap();
    let regmaster: I2cRegMaster<'_, MockI2c<'_>, 4> = RegMaster::over_i2c(MockI2c(&wire));

    assert_eq!(
        regmaster.start(&scheduler),
        Err(Error::TaskCreation(tickrs_tasks::Error::NoSlot))
    );
    assert!(regmaster.task().is_none());
}

#[test]
fn test_start_after_finalize() {
    let wire = Wire::new();
    let clock = || 0u32;
    let scheduler: Scheduler<'_, 2> = Scheduler::new(&clock);
    let regmaster: I2cRegMaster<'_, MockI2c<'_>, 4> = RegMaster::over_i2c(MockI2c(&wire));

    regmaster.finalize();
    assert_eq!(regmaster.start(&scheduler), Err(Error::Terminated));
    assert_eq!(wire.ops().last(), Some(&Op::Close));
}
