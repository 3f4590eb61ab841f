use std::time::{Duration, Instant};
use volley::prelude::*;
use volley_core::NetworkError;

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(20000)]
async fn one_user_three_seconds() {
    let mock = mock_service::spawn().await;

    let run = Scenario::new(mock.url("/ok"))
        .virtual_users(1)
        .duration(Duration::from_secs(3))
        .sleep(Duration::from_secs(1))
        .await
        .unwrap();

    let stats = &run.stats;
    assert!(
        (3..=4).contains(&stats.total_requests),
        "total={}",
        stats.total_requests
    );
    assert_eq!(stats.failed_checks, 0);
    assert_eq!(stats.passed_checks, stats.total_requests);
    assert!(run.elapsed >= Duration::from_secs(3));
    assert!(run.elapsed < Duration::from_secs(5));
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(20000)]
async fn server_errors_fail_every_check() {
    let mock = mock_service::spawn().await;

    let run = Scenario::new(mock.url("/status/500"))
        .virtual_users(4)
        .duration(Duration::from_secs(1))
        .sleep(Duration::from_millis(100))
        .await
        .unwrap();

    let stats = &run.stats;
    assert!(stats.total_requests > 0);
    assert_eq!(stats.failed_checks, stats.total_requests);
    assert_eq!(stats.passed_checks, 0);
    assert_eq!(stats.status_codes.get(&500), Some(&stats.total_requests));
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(20000)]
async fn repeated_runs_against_a_healthy_endpoint() {
    let mock = mock_service::spawn().await;

    for _ in 0..2 {
        let run = Scenario::new(mock.url("/books/"))
            .virtual_users(3)
            .duration(Duration::from_millis(800))
            .sleep(Duration::from_millis(100))
            .await
            .unwrap();

        assert!(run.stats.total_requests > 0);
        assert_eq!(run.stats.passed_checks, run.stats.total_requests);
        assert_eq!(run.stats.failed_checks, 0);
    }
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(20000)]
async fn zero_virtual_users_sends_nothing() {
    let mock = mock_service::spawn().await;

    let err = Scenario::new(mock.url("/ok"))
        .virtual_users(0)
        .duration(Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(err.is_config());
    assert_eq!(mock.hits(), 0);
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(20000)]
async fn request_rate_is_bounded_by_sleep() {
    let mock = mock_service::spawn().await;

    // 4 users * 2s / 200ms ~= 40 requests
    let run = Scenario::new(mock.url("/ok"))
        .virtual_users(4)
        .duration(Duration::from_secs(2))
        .sleep(Duration::from_millis(200))
        .await
        .unwrap();

    let total = run.stats.total_requests;
    assert!((28..=48).contains(&total), "total={total}");
    assert_eq!(mock.hits(), total);
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(20000)]
async fn runs_once_without_duration() {
    let mock = mock_service::spawn().await;

    let run = Scenario::new(mock.url("/ok"))
        .virtual_users(5)
        .sleep(Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(run.stats.total_requests, 5);
    assert_eq!(run.iterations, 5);
    assert_eq!(run.virtual_users, 5);
    assert!(run.elapsed < Duration::from_secs(5));
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(20000)]
async fn iteration_cap() {
    let mock = mock_service::spawn().await;

    let run = Scenario::new(mock.url("/ok"))
        .virtual_users(3)
        .iterations(4)
        .duration(Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(run.stats.total_requests, 12);
    assert_eq!(run.iterations, 12);
    assert!(run.elapsed < Duration::from_secs(10));
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(20000)]
async fn unreachable_target_completes() {
    let addr = mock_service::unused_addr();

    let run = Scenario::new(format!("http://{addr}/"))
        .virtual_users(2)
        .iterations(2)
        .await
        .unwrap();

    let stats = &run.stats;
    assert_eq!(stats.total_requests, 4);
    assert_eq!(stats.failed_checks, 4);
    assert_eq!(stats.network_errors.get(&NetworkError::Connect), Some(&4));
    assert!(stats.status_codes.is_empty());
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(20000)]
async fn timeouts_are_failed_checks() {
    let mock = mock_service::spawn().await;

    let run = Scenario::new(mock.url("/delay/ms/1000"))
        .virtual_users(2)
        .timeout(Duration::from_millis(100))
        .await
        .unwrap();

    assert_eq!(run.stats.failed_checks, 2);
    assert_eq!(
        run.stats.network_errors.get(&NetworkError::Timeout),
        Some(&2)
    );
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(20000)]
async fn latency_is_measured() {
    let mock = mock_service::spawn().await;

    let run = Scenario::new(mock.url("/delay/ms/50"))
        .virtual_users(2)
        .iterations(5)
        .await
        .unwrap();

    let latency = run.stats.latency;
    assert!(latency.min >= Duration::from_millis(50));
    assert!(latency.p50 >= Duration::from_millis(50));
    assert!(latency.max < Duration::from_millis(1_000));
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(20000)]
async fn external_shutdown_drains_promptly() {
    let mock = mock_service::spawn().await;

    let config = ScenarioConfig::builder()
        .target_url(mock.url("/ok"))
        .virtual_users(10)
        .duration(Duration::from_secs(60))
        .sleep_interval(Duration::from_millis(50))
        .build()
        .unwrap();

    let driver = ConcurrencyDriver::new(config);
    let start = Instant::now();
    let run = driver
        .run(tokio::time::sleep(Duration::from_millis(500)))
        .await
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(driver.state(), DriverState::Stopped);
    assert_eq!(
        run.stats.passed_checks + run.stats.failed_checks,
        run.stats.total_requests
    );
    assert_eq!(mock.hits(), run.stats.total_requests);
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(20000)]
async fn failure_policy_applies_to_results() {
    let mock = mock_service::spawn().await;

    let run = Scenario::new(mock.url("/status/503"))
        .iterations(2)
        .failure_policy(FailurePolicy::AnyFailure)
        .await
        .unwrap();

    assert!(FailurePolicy::AnyFailure.is_violated(&run.stats));
    assert!(!FailurePolicy::Never.is_violated(&run.stats));
}
