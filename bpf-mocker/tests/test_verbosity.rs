//! The daemon changes the process-wide log level, so these checks live in
//! their own test binary and run in a fixed order.

mod common;

use bpf_mocker::daemon::Daemon;
use bpf_mocker::daemon::ShutdownFlag;
use bpf_mocker_common::Event;
use log::LevelFilter;

use common::{test_config, FailAt, FakeInstrumentation, SharedBuffer};

fn run_with_verbose(verbose: bool) {
    let flag = ShutdownFlag::new();
    let fake = FakeInstrumentation::new(FailAt::Nothing, Vec::new(), &flag);
    Daemon::new(test_config().with_verbose(verbose), fake, |_: &Event| {})
        .with_shutdown_flag(flag)
        .with_diagnostics(Box::new(SharedBuffer::default()))
        .run()
        .unwrap();
}

#[test]
fn test_verbose_flag_gates_debug_output() {
    log::set_max_level(LevelFilter::Trace);
    run_with_verbose(true);
    assert_eq!(log::max_level(), LevelFilter::Trace);

    run_with_verbose(false);
    assert_eq!(log::max_level(), LevelFilter::Info);

    // A stricter level chosen by the caller is left alone
    log::set_max_level(LevelFilter::Warn);
    run_with_verbose(false);
    assert_eq!(log::max_level(), LevelFilter::Warn);
}
