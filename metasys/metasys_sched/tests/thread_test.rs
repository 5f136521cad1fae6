//! Thread lifecycles: cancellation, signalled joins and shared mutexes.

use metasys_core::lifecycle::{Join, JoinAfterKill};
use metasys_sched::{
    CancelInhibitor, Jthread, Pthread, PthreadMutex, SigFlags, Sigaction, ThisThread, Thread,
    ThreadExit,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn request_stop(_signal: libc::c_int) {
    STOP.store(true, Ordering::SeqCst);
}

fn spin_until_canceled() {
    loop {
        ThisThread::test_cancel();
        std::hint::spin_loop();
    }
}

#[test]
fn test_cancel_is_observed() {
    let mut thread = Thread::<()>::spawn_init(spin_until_canceled).unwrap();
    thread.cancel().unwrap();
    assert_eq!(thread.join(), Ok(ThreadExit::Canceled));
}

#[test]
fn test_jthread_cancels_on_drop() {
    static STARTED: AtomicBool = AtomicBool::new(false);
    {
        let _thread = Jthread::<()>::spawn_init(|| {
            STARTED.store(true, Ordering::SeqCst);
            spin_until_canceled()
        })
        .unwrap();
        while !STARTED.load(Ordering::SeqCst) {
            std::hint::spin_loop();
        }
    }
    assert!(STARTED.load(Ordering::SeqCst));
}

#[test]
fn test_inhibitor_defers_cancel() {
    let ready = Arc::new(AtomicBool::new(false));
    let release = Arc::new(AtomicBool::new(false));
    let mut thread = {
        let ready = Arc::clone(&ready);
        let release = Arc::clone(&release);
        Thread::<u32>::spawn_init(move || {
            let inhibitor = CancelInhibitor::new();
            ready.store(true, Ordering::SeqCst);
            while !release.load(Ordering::SeqCst) {
                ThisThread::test_cancel();
                std::hint::spin_loop();
            }
            drop(inhibitor);
            7
        })
        .unwrap()
    };
    while !ready.load(Ordering::SeqCst) {
        std::hint::spin_loop();
    }
    thread.cancel().unwrap();
    release.store(true, Ordering::SeqCst);
    assert_eq!(thread.join(), Ok(ThreadExit::Returned(7)));
}

#[test]
fn test_join_after_kill_delivers_signal() {
    let previous = unsafe { Sigaction::handler(request_stop, SigFlags::empty()).install(libc::SIGUSR1) }
        .unwrap();
    let finished = Arc::new(AtomicBool::new(false));
    {
        let finished = Arc::clone(&finished);
        let _thread = Pthread::<(), JoinAfterKill<{ libc::SIGUSR1 }>>::spawn_init(move || {
            while !STOP.load(Ordering::SeqCst) {
                std::hint::spin_loop();
            }
            finished.store(true, Ordering::SeqCst);
        })
        .unwrap();
    }
    assert!(finished.load(Ordering::SeqCst));
    unsafe { previous.install(libc::SIGUSR1) }.unwrap();
}

#[test]
fn test_mutex_serializes_threads() {
    let mutex = Arc::new(PthreadMutex::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let workers: Vec<Pthread<(), Join>> = (0..4)
        .map(|_| {
            let mutex = Arc::clone(&mutex);
            let inside = Arc::clone(&inside);
            let overlaps = Arc::clone(&overlaps);
            Pthread::spawn_init(move || {
                for _ in 0..100 {
                    let _guard = mutex.guard().unwrap();
                    if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .unwrap()
        })
        .collect();
    drop(workers);

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}
