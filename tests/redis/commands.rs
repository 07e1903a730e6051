use std::time::Duration;

use redkv::resp::RespValue;
use tokio::io::AsyncWriteExt;

use crate::test_utils::{TestEnv, TestUtils};

#[tokio::test]
async fn test_basic_commands() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let test_cases = vec![
        (TestUtils::ping_command(), RespValue::SimpleString("PONG".to_string())),
        (TestUtils::command(&["ECHO", "hey"]), TestUtils::bulk("hey")),
        (TestUtils::set_command("fruit", "apple"), TestUtils::ok()),
        (TestUtils::get_command("fruit"), TestUtils::bulk("apple")),
        (TestUtils::get_command("missing"), RespValue::NullBulkString),
        (TestUtils::command(&["INCR", "counter"]), RespValue::Integer(1)),
        (TestUtils::command(&["INCR", "counter"]), RespValue::Integer(2)),
        (
            TestUtils::command(&["INCR", "fruit"]),
            TestUtils::error("ERR value is not an integer or out of range"),
        ),
        (TestUtils::command(&["TYPE", "fruit"]), RespValue::SimpleString("string".to_string())),
        (TestUtils::command(&["TYPE", "missing"]), RespValue::SimpleString("none".to_string())),
        (TestUtils::command(&["KEYS", "*"]), TestUtils::bulk_array(&["counter", "fruit"])),
        (TestUtils::command(&["KEYS", "fr*"]), TestUtils::bulk_array(&["fruit"])),
        (
            TestUtils::command(&["CONFIG", "GET", "dir"]),
            TestUtils::bulk_array(&["dir", ""]),
        ),
        (TestUtils::command(&["CONFIG", "GET", "maxmemory"]), RespValue::Array(vec![])),
        (
            TestUtils::command(&["FLY"]),
            TestUtils::error("ERR unknown command 'FLY'"),
        ),
        (
            TestUtils::command(&["GET"]),
            TestUtils::error("ERR wrong number of arguments for 'get' command"),
        ),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }
}

#[tokio::test]
async fn test_set_with_expiration() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    client
        .assert_reply(TestUtils::command(&["SET", "session", "abc", "PX", "100"]), TestUtils::ok())
        .await;
    client
        .assert_reply(TestUtils::get_command("session"), TestUtils::bulk("abc"))
        .await;

    tokio::time::sleep(Duration::from_millis(150)).await;

    client
        .assert_reply(TestUtils::get_command("session"), RespValue::NullBulkString)
        .await;
    client
        .assert_reply(TestUtils::command(&["KEYS", "*"]), RespValue::Array(vec![]))
        .await;
}

#[tokio::test]
async fn test_list_scenario() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let test_cases = vec![
        (TestUtils::rpush_command("mylist", &["a", "b", "c"]), RespValue::Integer(3)),
        (
            TestUtils::command(&["LRANGE", "mylist", "0", "-1"]),
            TestUtils::bulk_array(&["a", "b", "c"]),
        ),
        (
            TestUtils::command(&["LPOP", "mylist", "2"]),
            TestUtils::bulk_array(&["a", "b"]),
        ),
        (TestUtils::command(&["LLEN", "mylist"]), RespValue::Integer(1)),
        (TestUtils::command(&["LPUSH", "mylist", "x", "y"]), RespValue::Integer(3)),
        (
            TestUtils::command(&["LRANGE", "mylist", "-2", "10"]),
            TestUtils::bulk_array(&["x", "c"]),
        ),
        (TestUtils::command(&["RPOP", "mylist", "1"]), TestUtils::bulk("c")),
        (
            TestUtils::command(&["LPOP", "mylist", "5"]),
            TestUtils::bulk_array(&["y", "x"]),
        ),
        (TestUtils::command(&["LPOP", "mylist"]), RespValue::NullBulkString),
        (TestUtils::rpush_command("mylist", &["a", "b"]), RespValue::Integer(2)),
        (TestUtils::command(&["LPOP", "mylist", "1"]), TestUtils::bulk("a")),
        (TestUtils::command(&["LPOP", "mylist"]), TestUtils::bulk("b")),
        (TestUtils::command(&["LLEN", "mylist"]), RespValue::Integer(0)),
        (TestUtils::command(&["TYPE", "mylist"]), RespValue::SimpleString("none".to_string())),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }
}

#[tokio::test]
async fn test_wrong_type_is_reported() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    client
        .assert_reply(TestUtils::set_command("name", "value"), TestUtils::ok())
        .await;

    let wrong_type =
        || TestUtils::error("WRONGTYPE Operation against a key holding the wrong kind of value");

    let test_cases = vec![
        (TestUtils::rpush_command("name", &["a"]), wrong_type()),
        (TestUtils::command(&["XREAD", "STREAMS", "name", "0-0"]), wrong_type()),
        (TestUtils::command(&["XREAD", "STREAMS", "name", "$"]), wrong_type()),
        (
            TestUtils::command(&["XREAD", "BLOCK", "10", "STREAMS", "name", "0-0"]),
            wrong_type(),
        ),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }
}

#[tokio::test]
async fn test_stream_commands() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    client
        .assert_reply(TestUtils::xadd_command("s", "1-1", &["f", "v"]), TestUtils::bulk("1-1"))
        .await;
    client
        .assert_reply(
            TestUtils::xadd_command("s", "1-1", &["f", "v2"]),
            TestUtils::error(
                "ERR The ID specified in XADD is equal or smaller than the target stream top item",
            ),
        )
        .await;
    client
        .assert_reply(TestUtils::xadd_command("s", "1-*", &["f", "v3"]), TestUtils::bulk("1-2"))
        .await;
    client
        .assert_reply(
            TestUtils::xadd_command("s", "0-0", &["f", "v"]),
            TestUtils::error("ERR The ID specified in XADD must be greater than 0-0"),
        )
        .await;
    client
        .assert_reply(TestUtils::command(&["TYPE", "s"]), RespValue::SimpleString("stream".to_string()))
        .await;

    let reply = client
        .request(TestUtils::command(&["XRANGE", "s", "-", "+"]))
        .await;
    assert_eq!(
        reply.encode(),
        "*2\r\n*2\r\n$3\r\n1-1\r\n*2\r\n$1\r\nf\r\n$1\r\nv\r\n*2\r\n$3\r\n1-2\r\n*2\r\n$1\r\nf\r\n$2\r\nv3\r\n"
    );

    let reply = client
        .request(TestUtils::command(&["XREAD", "STREAMS", "s", "1-1"]))
        .await;
    assert_eq!(
        reply.encode(),
        "*1\r\n*2\r\n$1\r\ns\r\n*1\r\n*2\r\n$3\r\n1-2\r\n*2\r\n$1\r\nf\r\n$2\r\nv3\r\n"
    );

    client
        .assert_reply(TestUtils::command(&["XREAD", "STREAMS", "s", "1-2"]), RespValue::NullArray)
        .await;
}

#[tokio::test]
async fn test_sorted_set_commands() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let test_cases = vec![
        (TestUtils::command(&["ZADD", "board", "20", "bob"]), RespValue::Integer(1)),
        (TestUtils::command(&["ZADD", "board", "10", "alice"]), RespValue::Integer(1)),
        (TestUtils::command(&["ZADD", "board", "10", "carol"]), RespValue::Integer(1)),
        (TestUtils::command(&["ZADD", "board", "5.5", "bob"]), RespValue::Integer(0)),
        (TestUtils::command(&["ZRANK", "board", "bob"]), RespValue::Integer(0)),
        (TestUtils::command(&["ZRANK", "board", "carol"]), RespValue::Integer(2)),
        (TestUtils::command(&["ZRANK", "board", "dave"]), RespValue::NullBulkString),
        (TestUtils::command(&["ZSCORE", "board", "bob"]), TestUtils::bulk("5.5")),
        (TestUtils::command(&["ZCARD", "board"]), RespValue::Integer(3)),
        (
            TestUtils::command(&["ZRANGE", "board", "0", "-1"]),
            TestUtils::bulk_array(&["bob", "alice", "carol"]),
        ),
        (TestUtils::command(&["ZREM", "board", "alice"]), RespValue::Integer(1)),
        (TestUtils::command(&["ZREM", "board", "alice"]), RespValue::Integer(0)),
        (TestUtils::command(&["ZCARD", "board"]), RespValue::Integer(2)),
        (
            TestUtils::command(&["ZADD", "board", "high", "erin"]),
            TestUtils::error("ERR value is not a valid float"),
        ),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }
}

#[tokio::test]
async fn test_geo_commands() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let test_cases = vec![
        (
            TestUtils::command(&["GEOADD", "places", "13.361389", "38.115556", "Palermo"]),
            RespValue::Integer(1),
        ),
        (
            TestUtils::command(&["GEOADD", "places", "15.087269", "37.502669", "Catania"]),
            RespValue::Integer(1),
        ),
        (
            TestUtils::command(&["ZSCORE", "places", "Palermo"]),
            TestUtils::bulk("3479099956230698"),
        ),
        (
            TestUtils::command(&["GEODIST", "places", "Palermo", "Catania"]),
            TestUtils::bulk("166274.1516"),
        ),
        (
            TestUtils::command(&["GEODIST", "places", "Palermo", "Catania", "km"]),
            TestUtils::bulk("166.2742"),
        ),
        (
            TestUtils::command(&["GEODIST", "places", "Palermo", "Rome"]),
            RespValue::NullBulkString,
        ),
        (
            TestUtils::command(&[
                "GEOSEARCH", "places", "FROMLONLAT", "15", "37", "BYRADIUS", "100", "km",
            ]),
            TestUtils::bulk_array(&["Catania"]),
        ),
        (
            TestUtils::command(&[
                "GEOSEARCH", "places", "FROMLONLAT", "15", "37", "BYRADIUS", "200", "km", "ASC",
            ]),
            TestUtils::bulk_array(&["Catania", "Palermo"]),
        ),
        (
            TestUtils::command(&[
                "GEOSEARCH", "places", "FROMLONLAT", "15", "37", "BYBOX", "400", "400", "km",
                "DESC",
            ]),
            TestUtils::bulk_array(&["Palermo", "Catania"]),
        ),
        (
            TestUtils::command(&[
                "GEOSEARCH", "places", "FROMMEMBER", "Palermo", "BYRADIUS", "100", "km",
            ]),
            TestUtils::bulk_array(&["Palermo"]),
        ),
        (
            TestUtils::command(&[
                "GEOSEARCH", "nowhere", "FROMLONLAT", "15", "37", "BYRADIUS", "100", "km",
            ]),
            RespValue::Array(vec![]),
        ),
        (
            TestUtils::command(&["GEOPOS", "places", "Rome"]),
            RespValue::Array(vec![RespValue::NullArray]),
        ),
        (
            TestUtils::command(&["GEOADD", "places", "200", "100", "Nowhere"]),
            TestUtils::error("ERR invalid longitude,latitude pair 200.000000,100.000000"),
        ),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }

    let RespValue::Array(positions) = client
        .request(TestUtils::command(&["GEOPOS", "places", "Palermo"]))
        .await
    else {
        panic!("GEOPOS should reply with an array");
    };
    let [RespValue::Array(pair)] = positions.as_slice() else {
        panic!("GEOPOS should reply with one position, got {:?}", positions);
    };
    let coordinates = pair
        .iter()
        .map(|value| match value {
            RespValue::BulkString(number) => number.parse::<f64>().unwrap(),
            other => panic!("expected a bulk string, got {:?}", other),
        })
        .collect::<Vec<_>>();

    for (actual, expected) in coordinates.iter().zip([13.361389, 38.115556]) {
        assert!((actual - expected).abs() < 1e-5, "position {} near {}", actual, expected);
    }
}

#[tokio::test]
async fn test_pipelined_commands_reply_in_order() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let pipeline = [
        TestUtils::set_command("a", "1"),
        TestUtils::command(&["INCR", "a"]),
        TestUtils::get_command("a"),
    ]
    .iter()
    .map(RespValue::encode)
    .collect::<String>();

    client.stream.write_all(pipeline.as_bytes()).await.unwrap();

    assert_eq!(client.read().await, TestUtils::ok());
    assert_eq!(client.read().await, RespValue::Integer(2));
    assert_eq!(client.read().await, TestUtils::bulk("2"));
}

#[tokio::test]
async fn test_malformed_fragment_does_not_close_connection() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    client.stream.write_all(b"*x\r\n").await.unwrap();

    client
        .assert_reply(TestUtils::ping_command(), RespValue::SimpleString("PONG".to_string()))
        .await;
}

#[tokio::test]
async fn test_info_reports_master_role() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let reply = client.request(TestUtils::command(&["INFO", "replication"])).await;
    let RespValue::BulkString(info) = reply else {
        panic!("expected a bulk string, got {:?}", reply);
    };

    assert!(info.contains("role:master"), "info: {}", info);
    assert!(info.contains("connected_slaves:0"), "info: {}", info);
    assert!(
        info.contains("master_replid:8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb"),
        "info: {}",
        info
    );
    assert!(info.contains("master_repl_offset:0"), "info: {}", info);
}
