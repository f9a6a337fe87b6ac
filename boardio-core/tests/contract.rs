//! Handle contract tests against the simulated board

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use boardio_core::counter::Counter;
use boardio_core::gpio::Gpio;
use boardio_core::os::{MessageQueue, Mutex, Semaphore};
use boardio_core::pwm::Pwm;
use boardio_core::timer::Timer;
use boardio_core::uart::Uart;
use boardio_core::{BoardConfig, DeviceClass, Error, Hal, Timeout};
use boardio_hal::counter::CounterMode;
use boardio_hal::pwm::PwmOutput;
use boardio_hal::timer::TimerMode;
use boardio_hal::{Direction, InterruptMode, Level, Pull, UartConfig};

fn board() -> (Hal, boardio_core::sim::SimBoard) {
    let _ = env_logger::builder().is_test(true).try_init();
    Hal::simulated(BoardConfig::simulated()).unwrap()
}

#[test]
fn open_close_reopen_every_gpio() {
    let (hal, _sim) = board();
    for id in 0..hal.device_count(DeviceClass::Gpio) as u8 {
        let pin = Gpio::open(&hal, id).unwrap();
        pin.close().unwrap();
        Gpio::open(&hal, id).unwrap().close().unwrap();
    }
    assert_eq!(hal.registry().open_count(DeviceClass::Gpio), 0);
}

#[test]
fn second_open_busy_until_close() {
    let (hal, _sim) = board();
    let first = Uart::open(&hal, 0, UartConfig::default()).unwrap();
    assert_eq!(
        Uart::open(&hal, 0, UartConfig::default()).err(),
        Some(Error::Busy)
    );
    drop(first);
    assert!(Uart::open(&hal, 0, UartConfig::default()).is_ok());
}

#[test]
fn open_out_of_range_is_invalid() {
    let (hal, _sim) = board();
    let count = hal.device_count(DeviceClass::Pwm) as u8;
    assert_eq!(Pwm::open(&hal, count).err(), Some(Error::InvalidArgument));
}

#[test]
fn mutex_recursion_and_foreign_unlock() {
    let mutex = Mutex::new();
    mutex.lock(Timeout::NoWait).unwrap();
    mutex.lock(Timeout::NoWait).unwrap();
    assert_eq!(mutex.lock_count(), 2);
    let other = mutex.clone();
    let foreign = thread::spawn(move || other.unlock()).join().unwrap();
    assert_eq!(foreign, Err(Error::PermissionDenied));
    mutex.unlock().unwrap();
    mutex.unlock().unwrap();
    assert_eq!(mutex.unlock(), Err(Error::InvalidState));
}

#[test]
fn semaphore_take_give() {
    let sem = Semaphore::new(2, 2).unwrap();
    sem.take(Timeout::NoWait).unwrap();
    sem.take(Timeout::NoWait).unwrap();
    assert_eq!(sem.take(Timeout::NoWait), Err(Error::Busy));
    sem.give();
    assert_eq!(sem.take(Timeout::NoWait), Ok(()));
}

#[test]
fn queue_full_then_purge_releases_sender() {
    let queue = MessageQueue::new(2, 3).unwrap();
    for n in 0..3u8 {
        queue.send(&[n, n], Timeout::NoWait).unwrap();
    }
    assert_eq!(queue.send(&[9, 9], Timeout::NoWait), Err(Error::Busy));

    let sender = queue.clone();
    let blocked = thread::spawn(move || sender.send(&[7, 7], Timeout::Forever));
    while !blocked.is_finished() {
        thread::sleep(Duration::from_millis(5));
        queue.purge();
    }
    assert_eq!(blocked.join().unwrap(), Err(Error::NoMessage));
    assert!(queue.is_empty());
}

#[test]
fn periodic_timer_status_counts_elapsed_periods() {
    let (hal, _sim) = board();
    let mut timer = Timer::open(&hal).unwrap();
    timer.start(TimerMode::Periodic, 10).unwrap();
    hal.advance_ms(35).unwrap();
    assert_eq!(timer.status_get(), Ok(3));
    assert_eq!(timer.status_get(), Ok(0));
    hal.advance_ms(5).unwrap();
    assert_eq!(timer.status_get(), Ok(1));
}

#[test]
fn pwm_extremes() {
    let (hal, sim) = board();
    let mut pwm = Pwm::open(&hal, 4).unwrap();
    assert_eq!(pwm.set(1_000, 1_001), Err(Error::InvalidArgument));
    pwm.set(1_000_000, 0).unwrap();
    assert_eq!(sim.pwm.output(4), Ok(Some(PwmOutput::Low)));
    pwm.set(1_000_000, 1_000_000).unwrap();
    assert_eq!(sim.pwm.output(4), Ok(Some(PwmOutput::High)));
}

#[test]
fn uart_loopback_roundtrip() {
    let (hal, sim) = board();
    sim.uart.set_loopback(1, true).unwrap();
    let mut port = Uart::open(&hal, 1, UartConfig::with_baud_rate(115_200)).unwrap();
    let sent = b"boardio loopback";
    port.write(sent).unwrap();
    let mut got = [0u8; 16];
    assert_eq!(port.read(&mut got, Timeout::Millis(100)), Ok(sent.len()));
    assert_eq!(&got, sent);
}

#[test]
fn stale_handle_after_registry_close() {
    let (hal, _sim) = board();
    let mut pin = Gpio::open_with(&hal, 2, Direction::Output, Pull::None).unwrap();
    hal.registry().close(pin.handle()).unwrap();
    assert_eq!(pin.write(Level::High), Err(Error::InvalidHandle));

    let mut fresh = Gpio::open_with(&hal, 2, Direction::Output, Pull::None).unwrap();
    drop(pin);
    assert_eq!(fresh.write(Level::High), Ok(()));
    assert_eq!(hal.registry().open_count(DeviceClass::Gpio), 1);
}

#[test]
fn gpio_enable_without_callback_delivers_nothing() {
    let (hal, sim) = board();
    let fired = Arc::new(AtomicUsize::new(0));
    let mut pin = Gpio::open_with(&hal, 5, Direction::Input, Pull::Down).unwrap();
    pin.interrupt_configure(InterruptMode::RisingEdge).unwrap();
    pin.interrupt_enable().unwrap();
    sim.gpio.drive(5, Level::High).unwrap();

    let f = Arc::clone(&fired);
    pin.callback_install(move || {
        f.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    sim.gpio.drive(5, Level::Low).unwrap();
    sim.gpio.drive(5, Level::High).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn counter_clear_keeps_counting() {
    let (hal, sim) = board();
    let mut counter = Counter::open(&hal, 3).unwrap();
    counter.start(CounterMode::RisingEdge).unwrap();
    sim.counter.pulse(3, 4).unwrap();
    counter.clear().unwrap();
    sim.counter.pulse(3, 1).unwrap();
    assert_eq!(counter.read(), Ok(1));
}
