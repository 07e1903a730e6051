use std::time::{Duration, Instant};

use bytes::BytesMut;
use redkv::{
    input::{read_reply, Frame, FrameDecoder},
    rdb::empty_snapshot,
    replication::DEFAULT_REPLICATION_ID,
    resp::RespValue,
};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    time::timeout,
};

use crate::test_utils::{TestClient, TestEnv, TestUtils, REPLY_TIMEOUT};

#[tokio::test]
async fn test_wait_without_replicas() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    client
        .assert_reply(TestUtils::wait_command("0", "100"), RespValue::Integer(0))
        .await;

    let started = Instant::now();
    client
        .assert_reply(TestUtils::wait_command("1", "100"), RespValue::Integer(0))
        .await;

    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_writes_reach_replica() {
    let master = TestEnv::new_master_server().await;
    let replica = TestEnv::new_replica_server(master.port()).await;
    let mut client = master.connect().await;

    TestUtils::eventually(|| master.server.replication.replica_count() == 1).await;

    let test_cases = vec![
        (TestUtils::set_command("foo", "bar"), TestUtils::ok()),
        (TestUtils::command(&["INCR", "hits"]), RespValue::Integer(1)),
        (TestUtils::rpush_command("list", &["a", "b"]), RespValue::Integer(2)),
        (TestUtils::wait_command("1", "1000"), RespValue::Integer(1)),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }

    TestUtils::eventually(|| {
        replica.server.store.get_string("foo") == Some("bar".to_string())
            && replica.server.store.get_string("hits") == Some("1".to_string())
    })
    .await;

    let mut replica_client = replica.connect().await;

    let test_cases = vec![
        (TestUtils::get_command("foo"), TestUtils::bulk("bar")),
        (
            TestUtils::command(&["LRANGE", "list", "0", "-1"]),
            TestUtils::bulk_array(&["a", "b"]),
        ),
        (
            TestUtils::set_command("foo", "local"),
            TestUtils::error("READONLY You can't write against a read only replica."),
        ),
        (
            TestUtils::wait_command("1", "10"),
            TestUtils::error("ERR WAIT cannot be used with replica instances"),
        ),
    ];

    for (command, expected) in test_cases {
        replica_client.assert_reply(command, expected).await;
    }

    let reply = replica_client
        .request(TestUtils::command(&["INFO", "replication"]))
        .await;
    let RespValue::BulkString(info) = reply else {
        panic!("expected a bulk string, got {:?}", reply);
    };
    assert!(info.contains("role:slave"), "info: {}", info);
    assert!(
        info.contains(&format!("master_port:{}", master.port())),
        "info: {}",
        info
    );
}

#[tokio::test]
async fn test_blocked_pop_is_replayed_on_replica() {
    let master = TestEnv::new_master_server().await;
    let replica = TestEnv::new_replica_server(master.port()).await;
    let mut waiter = master.connect().await;
    let mut producer = master.connect().await;

    waiter.send(TestUtils::blpop_command("queue", "0")).await;
    TestUtils::eventually(|| master.server.list_waiters.waiting("queue") == 1).await;

    producer
        .assert_reply(TestUtils::rpush_command("queue", &["a", "b"]), RespValue::Integer(2))
        .await;
    assert_eq!(waiter.read().await, TestUtils::bulk_array(&["queue", "a"]));

    TestUtils::eventually(|| {
        replica
            .server
            .store
            .with_list("queue", |list| list.iter().cloned().collect::<Vec<_>>())
            == Some(vec!["b".to_string()])
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_writes_keep_their_order_on_replica() {
    let master = TestEnv::new_master_server().await;
    let replica = TestEnv::new_replica_server(master.port()).await;

    TestUtils::eventually(|| master.server.replication.replica_count() == 1).await;

    let writers = (0..32)
        .map(|writer| {
            let address = master.address;
            tokio::spawn(async move {
                let mut client = TestClient::connect(address).await;

                for i in 0..100 {
                    let value = format!("{}-{}", writer, i);
                    client.send(TestUtils::set_command("last", &value)).await;
                    client.send(TestUtils::rpush_command("log", &[value.as_str()])).await;

                    if i % 10 == 9 {
                        client.send(TestUtils::command(&["LPOP", "log", "2"])).await;
                    }
                }

                for _ in 0..210 {
                    let reply = client.read().await;
                    assert!(
                        !matches!(reply, RespValue::Error(_)),
                        "writer {} got {:?}",
                        writer,
                        reply
                    );
                }
            })
        })
        .collect::<Vec<_>>();

    for writer in writers {
        writer.await.unwrap();
    }

    let mut client = master.connect().await;
    client
        .assert_reply(TestUtils::wait_command("1", "5000"), RespValue::Integer(1))
        .await;

    let log = |env: &TestEnv| {
        env.server
            .store
            .with_list("log", |list| list.iter().cloned().collect::<Vec<_>>())
    };

    let expected = log(&master);
    assert_eq!(expected.as_ref().map(Vec::len), Some(32 * 100 - 32 * 10 * 2));

    TestUtils::eventually(|| log(&replica) == expected).await;
    assert_eq!(
        replica.server.store.get_string("last"),
        master.server.store.get_string("last")
    );
}

/// Performs the replica side of the handshake on a raw connection and returns a
/// decoder positioned at the start of the replication stream.
async fn attach_raw_replica(master: &TestEnv) -> (TcpStream, FrameDecoder) {
    let mut stream = TcpStream::connect(master.address).await.unwrap();
    let mut buffer = BytesMut::new();

    let handshake = vec![
        (TestUtils::ping_command(), RespValue::SimpleString("PONG".to_string())),
        (
            TestUtils::command(&["REPLCONF", "listening-port", "6380"]),
            TestUtils::ok(),
        ),
        (TestUtils::command(&["REPLCONF", "capa", "psync2"]), TestUtils::ok()),
        (
            TestUtils::command(&["PSYNC", "?", "-1"]),
            RespValue::SimpleString(format!("FULLRESYNC {} 0", DEFAULT_REPLICATION_ID)),
        ),
    ];

    for (command, expected) in handshake {
        stream.write_all(command.encode().as_bytes()).await.unwrap();
        let reply = timeout(REPLY_TIMEOUT, read_reply(&mut stream, &mut buffer))
            .await
            .expect("master went quiet during handshake")
            .unwrap();
        assert_eq!(reply, expected, "handshake reply to {:?}", command);
    }

    (stream, FrameDecoder::for_master_link(buffer))
}

#[tokio::test]
async fn test_transaction_propagates_each_successful_write() {
    let master = TestEnv::new_master_server().await;
    let (mut replica, mut decoder) = attach_raw_replica(&master).await;
    let mut client = master.connect().await;

    TestUtils::eventually(|| master.server.replication.replica_count() == 1).await;

    let test_cases = vec![
        (TestUtils::command(&["MULTI"]), TestUtils::ok()),
        (TestUtils::set_command("a", "1"), RespValue::SimpleString("QUEUED".to_string())),
        (TestUtils::command(&["INCR", "a"]), RespValue::SimpleString("QUEUED".to_string())),
        (
            TestUtils::rpush_command("a", &["z"]),
            RespValue::SimpleString("QUEUED".to_string()),
        ),
        (
            TestUtils::command(&["EXEC"]),
            RespValue::Array(vec![
                TestUtils::ok(),
                RespValue::Integer(2),
                TestUtils::error(
                    "WRONGTYPE Operation against a key holding the wrong kind of value",
                ),
            ]),
        ),
        (
            TestUtils::command(&["INCR", "visits"]),
            RespValue::Integer(1),
        ),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }

    let expected = vec![
        TestUtils::set_command("a", "1"),
        TestUtils::command(&["INCR", "a"]),
        TestUtils::command(&["INCR", "visits"]),
    ];

    let mut received = Vec::new();
    while received.len() < expected.len() {
        let frames = timeout(REPLY_TIMEOUT, decoder.read_frames(&mut replica))
            .await
            .expect("master stopped propagating")
            .unwrap();

        received.extend(frames.into_iter().filter_map(|frame| match frame {
            Frame::Command { raw, .. } => Some(raw),
            Frame::Snapshot(_) => None,
        }));
    }

    let expected_frames = expected.iter().map(RespValue::encode).collect::<Vec<_>>();
    let received_frames = received
        .iter()
        .map(|raw| String::from_utf8_lossy(raw).into_owned())
        .collect::<Vec<_>>();

    assert_eq!(received_frames, expected_frames);
    assert_eq!(
        master.server.replication.offset(),
        expected_frames.iter().map(String::len).sum::<usize>() as u64
    );
}

/// Reads one command from the replica and answers it.
async fn expect_command(
    stream: &mut TcpStream,
    decoder: &mut FrameDecoder,
    expected: &[&str],
    reply: &str,
) {
    let frames = timeout(REPLY_TIMEOUT, decoder.read_frames(stream))
        .await
        .expect("replica went quiet during handshake")
        .unwrap();

    match frames.as_slice() {
        [Frame::Command { items, .. }] => {
            let items = items.iter().map(String::as_str).collect::<Vec<_>>();
            assert_eq!(items, expected);
        }
        other => panic!("unexpected frames {:?}", other),
    }

    stream.write_all(reply.as_bytes()).await.unwrap();
}

#[tokio::test]
async fn test_replica_acknowledges_processed_bytes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let master_port = listener.local_addr().unwrap().port();

    let replica = tokio::spawn(TestEnv::new_replica_server(master_port));

    let (mut master, _) = listener.accept().await.unwrap();
    let mut decoder = FrameDecoder::new();

    expect_command(&mut master, &mut decoder, &["PING"], "+PONG\r\n").await;

    let frames = timeout(REPLY_TIMEOUT, decoder.read_frames(&mut master))
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        frames.as_slice(),
        [Frame::Command { items, .. }] if items[..2] == ["REPLCONF", "listening-port"]
    ));
    master.write_all(b"+OK\r\n").await.unwrap();

    expect_command(&mut master, &mut decoder, &["REPLCONF", "capa", "psync2"], "+OK\r\n").await;
    expect_command(
        &mut master,
        &mut decoder,
        &["PSYNC", "?", "-1"],
        &format!("+FULLRESYNC {} 0\r\n", DEFAULT_REPLICATION_ID),
    )
    .await;

    let snapshot = empty_snapshot().unwrap();
    master
        .write_all(format!("${}\r\n", snapshot.len()).as_bytes())
        .await
        .unwrap();
    master.write_all(&snapshot).await.unwrap();

    let replica = replica.await.unwrap();

    let writes = [
        TestUtils::set_command("foo", "1"),
        TestUtils::set_command("bar", "2"),
        TestUtils::command(&["PING"]),
    ]
    .iter()
    .map(RespValue::encode)
    .collect::<String>();
    let getack = TestUtils::command(&["REPLCONF", "GETACK", "*"]).encode();

    assert_eq!(getack.len(), 37);

    master.write_all(writes.as_bytes()).await.unwrap();
    master.write_all(getack.as_bytes()).await.unwrap();

    let mut buffer = BytesMut::new();
    let test_cases = vec![writes.len(), writes.len() + getack.len()];

    for expected_offset in test_cases {
        let reply = timeout(REPLY_TIMEOUT, read_reply(&mut master, &mut buffer))
            .await
            .expect("replica never acknowledged")
            .unwrap();

        assert_eq!(
            reply,
            TestUtils::bulk_array(&["REPLCONF", "ACK", &expected_offset.to_string()]),
            "acknowledging offset {}",
            expected_offset
        );

        if expected_offset == writes.len() {
            master.write_all(getack.as_bytes()).await.unwrap();
        }
    }

    assert_eq!(replica.server.store.get_string("foo"), Some("1".to_string()));
    assert_eq!(replica.server.store.get_string("bar"), Some("2".to_string()));
}
