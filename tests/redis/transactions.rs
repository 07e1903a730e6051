use redkv::resp::RespValue;

use crate::test_utils::{TestEnv, TestUtils};

fn queued() -> RespValue {
    RespValue::SimpleString("QUEUED".to_string())
}

#[tokio::test]
async fn test_multi_exec_runs_queued_commands() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;
    let mut observer = env.connect().await;

    let test_cases = vec![
        (TestUtils::command(&["MULTI"]), TestUtils::ok()),
        (TestUtils::set_command("balance", "10"), queued()),
        (TestUtils::command(&["INCR", "balance"]), queued()),
        (TestUtils::command(&["INCR", "missing"]), queued()),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }

    // Nothing runs before EXEC.
    observer
        .assert_reply(TestUtils::get_command("balance"), RespValue::NullBulkString)
        .await;

    client
        .assert_reply(
            TestUtils::command(&["EXEC"]),
            RespValue::Array(vec![TestUtils::ok(), RespValue::Integer(11), RespValue::Integer(1)]),
        )
        .await;

    observer
        .assert_reply(TestUtils::get_command("balance"), TestUtils::bulk("11"))
        .await;
}

#[tokio::test]
async fn test_failing_command_does_not_abort_transaction() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let test_cases = vec![
        (TestUtils::set_command("name", "text"), TestUtils::ok()),
        (TestUtils::command(&["MULTI"]), TestUtils::ok()),
        (TestUtils::command(&["INCR", "name"]), queued()),
        (TestUtils::set_command("after", "yes"), queued()),
        (
            TestUtils::command(&["EXEC"]),
            RespValue::Array(vec![
                TestUtils::error("ERR value is not an integer or out of range"),
                TestUtils::ok(),
            ]),
        ),
        (TestUtils::get_command("after"), TestUtils::bulk("yes")),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }
}

#[tokio::test]
async fn test_transaction_control_errors() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let test_cases = vec![
        (TestUtils::command(&["EXEC"]), TestUtils::error("ERR EXEC without MULTI")),
        (TestUtils::command(&["DISCARD"]), TestUtils::error("ERR DISCARD without MULTI")),
        (TestUtils::command(&["MULTI"]), TestUtils::ok()),
        (
            TestUtils::command(&["MULTI"]),
            TestUtils::error("ERR MULTI calls can not be nested"),
        ),
        (TestUtils::command(&["EXEC"]), RespValue::Array(vec![])),
        (TestUtils::command(&["EXEC"]), TestUtils::error("ERR EXEC without MULTI")),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }
}

#[tokio::test]
async fn test_discard_drops_queued_commands() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let test_cases = vec![
        (TestUtils::command(&["MULTI"]), TestUtils::ok()),
        (TestUtils::set_command("ghost", "boo"), queued()),
        (TestUtils::command(&["DISCARD"]), TestUtils::ok()),
        (TestUtils::get_command("ghost"), RespValue::NullBulkString),
        (TestUtils::command(&["EXEC"]), TestUtils::error("ERR EXEC without MULTI")),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }
}

#[tokio::test]
async fn test_blocking_command_inside_transaction_does_not_block() {
    let env = TestEnv::new_master_server().await;
    let mut client = env.connect().await;

    let test_cases = vec![
        (TestUtils::command(&["MULTI"]), TestUtils::ok()),
        (TestUtils::blpop_command("empty", "0"), queued()),
        (TestUtils::command(&["EXEC"]), RespValue::Array(vec![RespValue::NullArray])),
    ];

    for (command, expected) in test_cases {
        client.assert_reply(command, expected).await;
    }
}

#[tokio::test]
async fn test_transactions_are_per_connection() {
    let env = TestEnv::new_master_server().await;
    let mut first = env.connect().await;
    let mut second = env.connect().await;

    first.assert_reply(TestUtils::command(&["MULTI"]), TestUtils::ok()).await;
    first.assert_reply(TestUtils::set_command("k", "from-first"), queued()).await;

    second
        .assert_reply(TestUtils::set_command("k", "from-second"), TestUtils::ok())
        .await;
    second
        .assert_reply(TestUtils::command(&["EXEC"]), TestUtils::error("ERR EXEC without MULTI"))
        .await;

    first
        .assert_reply(TestUtils::command(&["EXEC"]), RespValue::Array(vec![TestUtils::ok()]))
        .await;
    second
        .assert_reply(TestUtils::get_command("k"), TestUtils::bulk("from-first"))
        .await;
}
