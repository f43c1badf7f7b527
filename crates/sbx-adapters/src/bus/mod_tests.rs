use super::*;

#[tokio::test]
async fn fake_publisher_records_the_call() {
    let fake = FakeBusPublisher::default();
    fake.publish("scan-results", b"{}").await.unwrap();
    assert_eq!(fake.published(), vec![("scan-results".to_string(), b"{}".to_vec())]);
}

#[tokio::test]
async fn fake_publisher_can_be_made_to_fail() {
    let fake = FakeBusPublisher::default();
    fake.fail_publish("broker unreachable");
    let err = fake.publish("scan-results", b"{}").await.unwrap_err();
    assert!(matches!(err, BusError::Publish(topic, msg) if topic == "scan-results" && msg == "broker unreachable"));
}

#[tokio::test]
async fn fake_publisher_records_nothing_on_failure() {
    let fake = FakeBusPublisher::default();
    fake.fail_publish("broker unreachable");
    let _ = fake.publish("scan-results", b"{}").await;
    assert!(fake.published().is_empty());
}
