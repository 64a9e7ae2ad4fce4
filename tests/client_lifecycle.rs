//! End-to-end lifecycle tests against an in-process server.
//!
//! Each test runs a minimal scripted server on a loopback listener and
//! drives the client against it over plain TCP.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;

use twirc::{Client, ClientConfig, ClientError, ConnectionConfig, Event, TagValue};

fn test_config(port: u16, reconnect: bool) -> ClientConfig {
    ClientConfig {
        name: Some("ronni".to_string()),
        token: Some("abc123".to_string()),
        connection: ConnectionConfig::tcp_to("127.0.0.1", port, false).reconnect(reconnect),
    }
}

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

type ServerLines = Lines<BufReader<OwnedReadHalf>>;

async fn accept(listener: &TcpListener) -> (ServerLines, tokio::net::tcp::OwnedWriteHalf) {
    let (stream, _) = listener.accept().await.expect("accept");
    let (read_half, write_half) = stream.into_split();
    (BufReader::new(read_half).lines(), write_half)
}

async fn next_line(lines: &mut ServerLines) -> String {
    timeout(Duration::from_secs(5), lines.next_line())
        .await
        .expect("timed out reading line")
        .expect("read line")
        .expect("connection closed")
}

/// Read the three handshake lines and reply with the numeric welcome.
async fn complete_registration(
    lines: &mut ServerLines,
    write_half: &mut tokio::net::tcp::OwnedWriteHalf,
) -> String {
    assert_eq!(
        next_line(lines).await,
        "CAP REQ :twitch.tv/tags twitch.tv/commands"
    );
    assert_eq!(next_line(lines).await, "PASS oauth:abc123");
    let nick_line = next_line(lines).await;
    let nick = nick_line.strip_prefix("NICK ").expect("NICK line").to_string();

    write_half
        .write_all(format!(":tmi.twitch.tv 001 {nick} :Welcome, GLHF!\r\n").as_bytes())
        .await
        .expect("write welcome");
    nick
}

async fn wait_for(
    events: &mut broadcast::Receiver<Event>,
    pred: impl Fn(&Event) -> bool,
) -> Event {
    timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => {}
                Err(e) => panic!("event stream ended: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn connect_registers_and_confirms_membership() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut lines, mut write_half) = accept(&listener).await;
        complete_registration(&mut lines, &mut write_half).await;

        assert_eq!(next_line(&mut lines).await, "JOIN #dallas");
        write_half
            .write_all(b":ronni!ronni@ronni.tmi.twitch.tv JOIN #dallas\r\n")
            .await
            .unwrap();

        assert_eq!(next_line(&mut lines).await, "PRIVMSG #dallas :Hello");

        assert_eq!(next_line(&mut lines).await, "PART #dallas");
        write_half
            .write_all(b":ronni!ronni@ronni.tmi.twitch.tv PART #dallas\r\n")
            .await
            .unwrap();
    });

    let mut client = Client::new(test_config(port, false));
    let mut events = client.subscribe();

    client.connect().await.expect("connect");
    assert!(client.registered());
    assert_eq!(client.nick(), "ronni");

    wait_for(&mut events, |e| matches!(e, Event::Register)).await;

    assert!(client.join("dallas").await.expect("join"));
    assert!(client.say("dallas", "Hello"));
    assert!(client.part("dallas").await.expect("part"));

    server.await.expect("server");
}

#[tokio::test]
async fn inbound_probe_is_answered_immediately() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut lines, mut write_half) = accept(&listener).await;
        complete_registration(&mut lines, &mut write_half).await;

        write_half.write_all(b"PING :tmi.twitch.tv\r\n").await.unwrap();
        assert_eq!(next_line(&mut lines).await, "PONG :tmi.twitch.tv");
    });

    let mut client = Client::new(test_config(port, false));
    let mut events = client.subscribe();
    client.connect().await.expect("connect");

    let ping = wait_for(&mut events, |e| matches!(e, Event::Ping(_))).await;
    match ping {
        Event::Ping(ev) => assert_eq!(ev.raw, "PING :tmi.twitch.tv"),
        _ => unreachable!(),
    }

    server.await.expect("server");
}

#[tokio::test]
async fn registration_timeout_rejects_connect() {
    let (listener, port) = bind().await;

    // Accept the connection but never acknowledge registration.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(stream);
    });

    let mut client = Client::new(test_config(port, false));
    let result = client.connect().await;
    assert!(matches!(result, Err(ClientError::RegistrationTimeout)));
    assert!(!client.connected());

    server.abort();
}

#[tokio::test]
async fn state_bearing_messages_update_the_store() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut lines, mut write_half) = accept(&listener).await;
        complete_registration(&mut lines, &mut write_half).await;

        write_half
            .write_all(
                b"@color=#0000FF;user-id=1337 :tmi.twitch.tv GLOBALUSERSTATE\r\n\
                  @mod=1;color=#FF0000 :tmi.twitch.tv USERSTATE #dallas\r\n\
                  @slow=5;followers-only=0 :tmi.twitch.tv ROOMSTATE #dallas\r\n",
            )
            .await
            .unwrap();

        // Keep the connection open until the client has asserted.
        let _ = next_line(&mut lines).await;
    });

    let mut client = Client::new(test_config(port, false));
    let mut events = client.subscribe();
    client.connect().await.expect("connect");

    wait_for(&mut events, |e| matches!(e, Event::RoomState(_))).await;

    let global = client.global_user_state().expect("global user state");
    assert_eq!(global["color"], TagValue::Str("#0000FF".to_string()));
    assert_eq!(global["userId"], TagValue::Str("1337".to_string()));

    let state = client.channel_state("dallas").expect("channel state");
    assert_eq!(state.user_state["mod"], TagValue::Bool(true));
    assert_eq!(state.room_state["slow"], TagValue::Int(5));
    assert_eq!(state.room_state["followersOnly"], TagValue::Bool(true));

    client.send_raw("PING");
    server.await.expect("server");
}

#[tokio::test]
async fn chat_messages_decode_plain_and_action() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut lines, mut write_half) = accept(&listener).await;
        complete_registration(&mut lines, &mut write_half).await;

        // Two messages in a single chunk: dispatched in arrival order.
        write_half
            .write_all(
                b":ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #chan :Hello\r\n\
                  :ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #chan :\x01ACTION waves\x01\r\n",
            )
            .await
            .unwrap();

        let _ = next_line(&mut lines).await;
    });

    let mut client = Client::new(test_config(port, false));
    let mut events = client.subscribe();
    client.connect().await.expect("connect");

    let first = wait_for(&mut events, |e| matches!(e, Event::Message(_))).await;
    let second = wait_for(&mut events, |e| matches!(e, Event::Message(_))).await;

    match (first, second) {
        (Event::Message(plain), Event::Message(action)) => {
            assert_eq!(plain.message, "Hello");
            assert!(!plain.is_action);
            assert_eq!(action.message, "waves");
            assert!(action.is_action);
        }
        _ => unreachable!(),
    }

    client.send_raw("PING");
    server.await.expect("server");
}

#[tokio::test]
async fn server_close_surfaces_as_disconnect() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut lines, mut write_half) = accept(&listener).await;
        complete_registration(&mut lines, &mut write_half).await;
        // Drop both halves: abrupt close.
    });

    let mut client = Client::new(test_config(port, false));
    let mut events = client.subscribe();
    client.connect().await.expect("connect");
    server.await.expect("server");

    let disconnect = wait_for(&mut events, |e| matches!(e, Event::Disconnect(_))).await;
    match disconnect {
        Event::Disconnect(ev) => assert!(ev.reason.is_some()),
        _ => unreachable!(),
    }
    assert!(!client.connected());
}

#[tokio::test]
async fn reconnect_rejoins_known_channels() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        // First connection: register, seed channel state, then drop.
        let (mut lines, mut write_half) = accept(&listener).await;
        complete_registration(&mut lines, &mut write_half).await;
        write_half
            .write_all(b"@mod=0 :tmi.twitch.tv USERSTATE #dallas\r\n")
            .await
            .unwrap();
        drop(write_half);
        drop(lines);

        // Second connection: the client must register again and rejoin
        // every channel it holds state for.
        let (mut lines, mut write_half) = accept(&listener).await;
        complete_registration(&mut lines, &mut write_half).await;
        assert_eq!(next_line(&mut lines).await, "JOIN #dallas");
    });

    let mut client = Client::new(test_config(port, true));
    let mut events = client.subscribe();
    client.connect().await.expect("connect");

    wait_for(&mut events, |e| matches!(e, Event::UserState(_))).await;
    wait_for(&mut events, |e| matches!(e, Event::Disconnect(_))).await;

    // Second registration happens in the background after backoff.
    wait_for(&mut events, |e| matches!(e, Event::Register)).await;

    server.await.expect("server");
    client.disconnect();
}

#[tokio::test]
async fn voluntary_disconnect_emits_clean_event() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut lines, mut write_half) = accept(&listener).await;
        complete_registration(&mut lines, &mut write_half).await;
        // Hold the connection until the client hangs up.
        let _ = lines.next_line().await;
    });

    let mut client = Client::new(test_config(port, true));
    let mut events = client.subscribe();
    client.connect().await.expect("connect");

    client.disconnect();
    let disconnect = wait_for(&mut events, |e| matches!(e, Event::Disconnect(_))).await;
    match disconnect {
        Event::Disconnect(ev) => assert!(ev.reason.is_none()),
        _ => unreachable!(),
    }
    assert!(!client.connected());

    // A voluntary disconnect must not trigger reconnection.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!client.connected());

    server.await.expect("server");
}

#[tokio::test]
async fn connect_twice_is_rejected() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut lines, mut write_half) = accept(&listener).await;
        complete_registration(&mut lines, &mut write_half).await;
        let _ = lines.next_line().await;
    });

    let mut client = Client::new(test_config(port, false));
    client.connect().await.expect("connect");

    assert!(matches!(
        client.connect().await,
        Err(ClientError::AlreadyConnected)
    ));

    client.disconnect();
    server.await.expect("server");
}

#[tokio::test]
async fn join_times_out_without_confirmation() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut lines, mut write_half) = accept(&listener).await;
        complete_registration(&mut lines, &mut write_half).await;
        // Swallow the JOIN without confirming it.
        assert_eq!(next_line(&mut lines).await, "JOIN #dallas");
        let _ = lines.next_line().await;
    });

    let mut client = Client::new(test_config(port, false));
    client.connect().await.expect("connect");

    let joined = client.join("dallas").await.expect("join");
    assert!(!joined);

    client.disconnect();
    server.await.expect("server");
}

// Sanity check that a raw TcpStream write path matches what the codec
// produces: lines are CRLF-framed on the wire.
#[tokio::test]
async fn outgoing_lines_are_crlf_framed() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut raw = String::new();
        for _ in 0..3 {
            reader.read_line(&mut raw).await.expect("read");
        }
        assert!(raw.ends_with("\r\n"));

        let nick = raw
            .lines()
            .last()
            .and_then(|l| l.strip_prefix("NICK "))
            .expect("NICK line")
            .to_string();
        write_half
            .write_all(format!(":tmi.twitch.tv 001 {nick} :Welcome, GLHF!\r\n").as_bytes())
            .await
            .unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).await.expect("read");
        assert_eq!(line, "PRIVMSG #dallas :Hello\r\n");
    });

    let mut client = Client::new(test_config(port, false));
    client.connect().await.expect("connect");
    assert!(client.say("dallas", "Hello"));

    server.await.expect("server");
    client.disconnect();
}
