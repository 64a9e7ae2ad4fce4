//! Benchmarks for wire message parsing and tag normalization.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use twirc::{normalize_tags, Message};

/// Bare liveness probe
const SIMPLE_MESSAGE: &str = "PING :tmi.twitch.tv";

/// Untagged chat message
const PLAIN_MESSAGE: &str = ":ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #dallas :Kappa Keepo";

/// Chat message with a realistic tag load
const TAGGED_MESSAGE: &str = "@badge-info=subscriber/12;badges=subscriber/12,premium/1;color=#0D4200;display-name=ronni;emotes=25:0-4,12-16/1902:6-10;id=b34ccfc7-4977-403a-8a94-33c6bac34fb8;mod=0;room-id=1337;subscriber=1;tmi-sent-ts=1507246572675;turbo=1;user-id=1337;user-type= :ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #ronni :Kappa Keepo Kappa";

/// Room settings update
const ROOMSTATE_MESSAGE: &str =
    "@emote-only=0;followers-only=0;r9k=0;rituals=0;room-id=1337;slow=5;subs-only=0 :tmi.twitch.tv ROOMSTATE #dallas";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Parsing");

    group.bench_function("simple_ping", |b| {
        b.iter(|| {
            let msg = Message::parse(black_box(SIMPLE_MESSAGE)).unwrap();
            black_box(msg)
        })
    });

    group.bench_function("plain_privmsg", |b| {
        b.iter(|| {
            let msg = Message::parse(black_box(PLAIN_MESSAGE)).unwrap();
            black_box(msg)
        })
    });

    group.bench_function("tagged_privmsg", |b| {
        b.iter(|| {
            let msg = Message::parse(black_box(TAGGED_MESSAGE)).unwrap();
            black_box(msg)
        })
    });

    group.finish();
}

fn benchmark_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("Tag Normalization");

    let tagged = Message::parse(TAGGED_MESSAGE).unwrap();
    group.bench_function("privmsg_tags", |b| {
        b.iter(|| black_box(normalize_tags(black_box(&tagged.tags))))
    });

    let roomstate = Message::parse(ROOMSTATE_MESSAGE).unwrap();
    group.bench_function("roomstate_tags", |b| {
        b.iter(|| black_box(normalize_tags(black_box(&roomstate.tags))))
    });

    group.finish();
}

fn benchmark_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Serialization");

    group.bench_function("privmsg", |b| {
        let msg = Message::privmsg("#dallas", "Kappa Keepo");
        b.iter(|| black_box(msg.to_string()))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_parsing,
    benchmark_normalization,
    benchmark_serialization
);
criterion_main!(benches);
