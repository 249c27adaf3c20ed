use qdpi_cli::commands::simulate::{execute, Channel};

#[test]
fn test_within_bound_always_recovers() {
    let summary = execute(Channel::ByteErrors(16), 25, 11).unwrap();
    assert_eq!(summary.trials, 25);
    assert_eq!(summary.recovered, 25);
    assert_eq!(summary.avg_bytes_corrupted, 16.0);
}

#[test]
fn test_beyond_bound_is_lost() {
    let summary = execute(Channel::ByteErrors(40), 10, 3).unwrap();
    assert_eq!(summary.lost, 10);
}

#[test]
fn test_zero_ber_is_clean() {
    let summary = execute(Channel::BitErrorRate(0.0), 5, 1).unwrap();
    assert_eq!(summary.recovered, 5);
    assert_eq!(summary.avg_bytes_corrupted, 0.0);
}

#[test]
fn test_invalid_arguments() {
    assert!(execute(Channel::ByteErrors(1), 0, 1).is_err());
    assert!(execute(Channel::BitErrorRate(1.5), 1, 1).is_err());
}
