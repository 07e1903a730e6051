use std::time::{Duration, Instant};

use redkv::resp::RespValue;

use crate::test_utils::{TestEnv, TestUtils};

#[tokio::test]
async fn test_blpop_is_served_by_later_push() {
    let env = TestEnv::new_master_server().await;
    let mut waiter = env.connect().await;
    let mut producer = env.connect().await;

    waiter.send(TestUtils::blpop_command("queue", "0")).await;
    TestUtils::eventually(|| env.server.list_waiters.waiting("queue") == 1).await;

    producer
        .assert_reply(TestUtils::rpush_command("queue", &["v1"]), RespValue::Integer(1))
        .await;

    assert_eq!(waiter.read().await, TestUtils::bulk_array(&["queue", "v1"]));

    // The element went to the waiter, not the list.
    producer
        .assert_reply(TestUtils::command(&["LLEN", "queue"]), RespValue::Integer(0))
        .await;
}

#[tokio::test]
async fn test_blpop_returns_immediately_when_list_has_elements() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let test_cases = vec![
        (TestUtils::rpush_command("ready", &["a", "b"]), RespValue::Integer(2)),
        (TestUtils::blpop_command("ready", "0"), TestUtils::bulk_array(&["ready", "a"])),
        (
            TestUtils::command(&["BRPOP", "empty", "ready", "0"]),
            TestUtils::bulk_array(&["ready", "b"]),
        ),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }
}

#[tokio::test]
async fn test_concurrent_blpop_each_element_delivered_once() {
    let env = TestEnv::new_master_server().await;
    let mut first = env.connect().await;
    let mut second = env.connect().await;
    let mut producer = env.connect().await;

    first.send(TestUtils::blpop_command("jobs", "0")).await;
    TestUtils::eventually(|| env.server.list_waiters.waiting("jobs") == 1).await;
    second.send(TestUtils::blpop_command("jobs", "0")).await;
    TestUtils::eventually(|| env.server.list_waiters.waiting("jobs") == 2).await;

    producer
        .assert_reply(TestUtils::rpush_command("jobs", &["j1", "j2"]), RespValue::Integer(2))
        .await;

    // Waiters are served in arrival order.
    assert_eq!(first.read().await, TestUtils::bulk_array(&["jobs", "j1"]));
    assert_eq!(second.read().await, TestUtils::bulk_array(&["jobs", "j2"]));

    producer
        .assert_reply(TestUtils::command(&["LLEN", "jobs"]), RespValue::Integer(0))
        .await;
}

#[tokio::test]
async fn test_blpop_times_out_with_null_array() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let started = Instant::now();
    client
        .assert_reply(TestUtils::blpop_command("nothing", "0.1"), RespValue::NullArray)
        .await;

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(env.server.list_waiters.waiting("nothing"), 0);
}

#[tokio::test]
async fn test_blpop_rejects_invalid_timeout() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let test_cases = vec![
        (
            TestUtils::blpop_command("k", "soon"),
            TestUtils::error("ERR timeout is not a float or out of range"),
        ),
        (
            TestUtils::blpop_command("k", "-1"),
            TestUtils::error("ERR timeout is not a float or out of range"),
        ),
        (
            TestUtils::command(&["BLPOP", "k"]),
            TestUtils::error("ERR wrong number of arguments for 'blpop' command"),
        ),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }
}

#[tokio::test]
async fn test_disconnected_waiter_does_not_take_element() {
    let env = TestEnv::new_master_server().await;
    let mut producer = env.connect().await;

    {
        let mut waiter = env.connect().await;
        waiter.send(TestUtils::blpop_command("drop", "0")).await;
        TestUtils::eventually(|| env.server.list_waiters.waiting("drop") == 1).await;
    }

    TestUtils::eventually(|| env.server.list_waiters.waiting("drop") == 0).await;

    producer
        .assert_reply(TestUtils::rpush_command("drop", &["kept"]), RespValue::Integer(1))
        .await;
    producer
        .assert_reply(
            TestUtils::command(&["LRANGE", "drop", "0", "-1"]),
            TestUtils::bulk_array(&["kept"]),
        )
        .await;
}

#[tokio::test]
async fn test_xread_block_waits_for_new_entry() {
    let env = TestEnv::new_master_server().await;
    let mut reader = env.connect().await;
    let mut writer = env.connect().await;

    writer
        .assert_reply(TestUtils::xadd_command("events", "1-1", &["old", "x"]), TestUtils::bulk("1-1"))
        .await;

    reader
        .send(TestUtils::command(&["XREAD", "BLOCK", "0", "STREAMS", "events", "$"]))
        .await;
    TestUtils::eventually(|| env.server.stream_waiters.waiting("events") == 1).await;

    writer
        .assert_reply(
            TestUtils::xadd_command("events", "2-0", &["temperature", "21"]),
            TestUtils::bulk("2-0"),
        )
        .await;

    assert_eq!(
        reader.read().await.encode(),
        "*1\r\n*2\r\n$6\r\nevents\r\n*1\r\n*2\r\n$3\r\n2-0\r\n*2\r\n$11\r\ntemperature\r\n$2\r\n21\r\n"
    );
}

#[tokio::test]
async fn test_xread_block_times_out() {
    let env = TestEnv::new_master_server().await;
    let mut reader = env.connect().await;

    reader
        .assert_reply(
            TestUtils::command(&["XREAD", "BLOCK", "50", "STREAMS", "quiet", "0-0"]),
            RespValue::NullArray,
        )
        .await;
}
