//! Subscriber installation. Lives in its own test binary because it sets the
//! process-wide subscriber.

#![cfg(feature = "logging")]

use toprank::logging::init_logging;

#[test]
fn init_logging_installs_global_subscriber() {
    init_logging();
    tracing::info!("subscriber installed");

    let second =
        tracing::subscriber::set_global_default(tracing::subscriber::NoSubscriber::default());
    assert!(second.is_err());
}
