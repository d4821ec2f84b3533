//! Launches from several threads at once.
//!
//! A pipe end leaked into a sibling child would keep `cat` from ever seeing
//! EOF, so each round trip finishing is the assertion.

use std::io::Write;
use std::thread;

use proclaunch::ProcessHandle;
use proclaunch_integration_tests::{cat_pipe, read_to_string, shell};

const THREADS: usize = 8;
const ROUNDS: usize = 50;

fn round_trip(payload: &str) -> String {
    let handle = ProcessHandle::new(cat_pipe()).unwrap();
    let mut pipes = handle.launch().unwrap();

    let mut stdin = pipes.stdin.take().unwrap();
    stdin.write_all(payload.as_bytes()).unwrap();
    drop(stdin);

    let output = read_to_string(pipes.stdout.take().unwrap()).unwrap();
    assert_eq!(handle.wait_until_exit().unwrap().exit_code(), Some(0));
    output
}

#[test]
fn test_parallel_round_trips() {
    let workers: Vec<_> = (0..THREADS)
        .map(|worker| {
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    let payload = format!("worker {worker} round {round}\n");
                    assert_eq!(round_trip(&payload), payload);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn test_handles_are_independent() {
    let sleeper = ProcessHandle::new(shell("exec sleep 30")).unwrap();
    let quick = ProcessHandle::new(shell("exit 3")).unwrap();

    sleeper.launch().unwrap();
    quick.launch().unwrap();
    assert_eq!(quick.wait_until_exit().unwrap().exit_code(), Some(3));
    assert!(sleeper.is_running());

    sleeper.kill().unwrap();
    assert!(sleeper.wait_until_exit().unwrap().terminated_by_signal());
}
