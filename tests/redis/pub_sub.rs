use redkv::resp::RespValue;

use crate::test_utils::{TestEnv, TestUtils};

fn confirmation(kind: &str, channel: &str, count: i64) -> RespValue {
    RespValue::Array(vec![
        TestUtils::bulk(kind),
        TestUtils::bulk(channel),
        RespValue::Integer(count),
    ])
}

#[tokio::test]
async fn test_published_message_reaches_subscribers() {
    let env = TestEnv::new_master_server().await;
    let mut subscriber = env.connect().await;
    let mut publisher = env.connect().await;

    subscriber
        .send(TestUtils::command(&["SUBSCRIBE", "news", "sports"]))
        .await;
    assert_eq!(subscriber.read().await, confirmation("subscribe", "news", 1));
    assert_eq!(subscriber.read().await, confirmation("subscribe", "sports", 2));

    let test_cases = vec![
        (TestUtils::command(&["PUBLISH", "news", "hello"]), RespValue::Integer(1)),
        (TestUtils::command(&["PUBLISH", "weather", "rain"]), RespValue::Integer(0)),
    ];

    for (command, expected) in test_cases {
        publisher.assert_reply(command, expected).await;
    }

    assert_eq!(
        subscriber.read().await,
        TestUtils::bulk_array(&["message", "news", "hello"])
    );
}

#[tokio::test]
async fn test_subscribed_mode_restricts_commands() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    client.send(TestUtils::command(&["SUBSCRIBE", "news"])).await;
    assert_eq!(client.read().await, confirmation("subscribe", "news", 1));

    let test_cases = vec![
        (
            TestUtils::get_command("key"),
            TestUtils::error(
                "ERR Can't execute 'get': only (P|S)SUBSCRIBE / (P|S)UNSUBSCRIBE / PING / QUIT / RESET are allowed in this context",
            ),
        ),
        (TestUtils::ping_command(), TestUtils::bulk_array(&["pong", ""])),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }
}

#[tokio::test]
async fn test_unsubscribe_leaves_subscribed_mode() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;
    let mut publisher = env.connect().await;

    client.send(TestUtils::command(&["SUBSCRIBE", "a", "b"])).await;
    assert_eq!(client.read().await, confirmation("subscribe", "a", 1));
    assert_eq!(client.read().await, confirmation("subscribe", "b", 2));

    client.send(TestUtils::command(&["UNSUBSCRIBE", "a"])).await;
    assert_eq!(client.read().await, confirmation("unsubscribe", "a", 1));

    publisher
        .assert_reply(TestUtils::command(&["PUBLISH", "a", "gone"]), RespValue::Integer(0))
        .await;

    client.send(TestUtils::command(&["UNSUBSCRIBE"])).await;
    assert_eq!(client.read().await, confirmation("unsubscribe", "b", 0));

    client
        .assert_reply(TestUtils::ping_command(), RespValue::SimpleString("PONG".to_string()))
        .await;
}

#[tokio::test]
async fn test_disconnected_subscriber_is_forgotten() {
    let env = TestEnv::new_master_server().await;
    let mut publisher = env.connect().await;

    {
        let mut subscriber = env.connect().await;
        subscriber.send(TestUtils::command(&["SUBSCRIBE", "news"])).await;
        assert_eq!(subscriber.read().await, confirmation("subscribe", "news", 1));
    }

    TestUtils::eventually(|| env.server.channels.subscriber_count("news") == 0).await;

    publisher
        .assert_reply(TestUtils::command(&["PUBLISH", "news", "anyone?"]), RespValue::Integer(0))
        .await;
}
