use std::{
    sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}},
    thread::JoinHandle,
    time::{Duration, Instant},
};

const TIMER_RESOLUTION: Duration = Duration::from_millis(10);

type TimerFun = Box<dyn FnMut() + Send + 'static>;

struct TimerCommand {
    fun:    TimerFun,
    time:   Instant,
    period: Duration,
}

/// Background thread which calls closures periodically
pub struct Timer {
    thread:    Option<JoinHandle<()>>,
    commands:  Arc<Mutex<Vec<TimerCommand>>>,
    exit_flag: Arc<AtomicBool>,
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::debug!("Stopping timer thread...");
        self.exit_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            _ = thread.join();
        }
        log::debug!("Timer thread stopped");
    }
}

impl Timer {
    pub fn new() -> Self {
        let commands = Arc::new(Mutex::new(Vec::new()));
        let exit_flag = Arc::new(AtomicBool::new(false));

        let thread = {
            let commands = Arc::clone(&commands);
            let exit_flag = Arc::clone(&exit_flag);
            std::thread::spawn(move || {
                Self::thread_fun(&commands, &exit_flag);
            })
        };
        Self {
            thread: Some(thread),
            commands,
            exit_flag,
        }
    }

    /// First call is made after `period`
    pub fn exec_periodic(&self, period: Duration, fun: impl FnMut() + Send + 'static) {
        let mut commands = self.commands.lock().unwrap();
        commands.push(TimerCommand {
            fun: Box::new(fun),
            time: Instant::now(),
            period,
        });
    }

    fn thread_fun(
        commands:  &Mutex<Vec<TimerCommand>>,
        exit_flag: &AtomicBool
    ) {
        while !exit_flag.load(Ordering::Relaxed) {
            let mut commands = commands.lock().unwrap();
            for cmd in &mut *commands {
                if cmd.time.elapsed() < cmd.period {
                    continue;
                }
                (cmd.fun)();
                cmd.time = Instant::now();
            }
            drop(commands);
            std::thread::sleep(TIMER_RESOLUTION);
        }
    }
}

#[test]
fn test_timer_periodic() {
    use std::sync::atomic::AtomicUsize;

    let fast_cnt = Arc::new(AtomicUsize::new(0));
    let slow_cnt = Arc::new(AtomicUsize::new(0));
    let timer = Timer::new();
    {
        let fast_cnt = Arc::clone(&fast_cnt);
        timer.exec_periodic(Duration::from_millis(20), move || {
            fast_cnt.fetch_add(1, Ordering::Relaxed);
        });
    }
    {
        let slow_cnt = Arc::clone(&slow_cnt);
        timer.exec_periodic(Duration::from_secs(60), move || {
            slow_cnt.fetch_add(1, Ordering::Relaxed);
        });
    }
    std::thread::sleep(Duration::from_millis(300));
    drop(timer);
    let fast_calls = fast_cnt.load(Ordering::Relaxed);
    assert!(fast_calls >= 2);
    assert_eq!(slow_cnt.load(Ordering::Relaxed), 0);

    // No calls after timer is dropped
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(fast_cnt.load(Ordering::Relaxed), fast_calls);
}
