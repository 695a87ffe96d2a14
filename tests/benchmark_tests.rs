//! Performance benchmarks for the log processing hot path

use server::config::Config;
use server::geo::NoGeo;
use server::storage::MemoryStorage;
use server::Game;
use shared::action::{wrap, SAY_WIDTH};
use shared::Event;
use std::time::Instant;

const SAMPLE_LINES: [&str; 8] = [
    "  3:27 Kill: 2 4 19: Alice killed Bob by UT_MOD_LR300",
    "  3:28 Hit: 4 2 1 19: Alice hit Bob in the Head",
    "  3:29 ClientUserinfo: 2 \\ip\\10.0.0.2:27960\\name\\Alice\\racered\\2\\cl_guid\\AAAA2222\\gear\\GZAAVWT",
    "  3:30 ClientUserinfoChanged: 2 n\\Alice\\t\\1\\r\\1\\tl\\0",
    "  3:31 say: 2 Alice: gg",
    "  3:32 Flag: 2 2: team_CTF_blueflag",
    "  3:33 Item: 2 ut_weapon_lr",
    "------------------------------------------------------------",
];

/// Benchmarks line parsing, including lines the bot ignores
#[test]
fn benchmark_event_parsing() {
    let iterations = 20_000;
    let start = Instant::now();
    let mut parsed = 0;

    for _ in 0..iterations {
        for line in SAMPLE_LINES {
            if Event::parse(line).is_some() {
                parsed += 1;
            }
        }
    }

    let duration = start.elapsed();
    let lines = iterations * SAMPLE_LINES.len();
    println!(
        "Event parsing: {} lines in {:?} ({:.2} ns/line)",
        lines,
        duration,
        duration.as_nanos() as f64 / lines as f64
    );

    assert_eq!(parsed, iterations * 6);
    // Should complete in under 2 seconds for 160k lines
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks dispatch of a kill/hit heavy round through the coordinator
#[test]
fn benchmark_round_dispatch() {
    let mut game = Game::new(
        Config::default(),
        Box::new(MemoryStorage::new()),
        Box::new(NoGeo),
    );
    game.go_live(Vec::new());
    game.handle_line(
        "  0:00 InitGame: \\g_gametype\\4\\g_modversion\\4.2.023\\mapname\\ut4_abbey",
        0,
    );
    for slot in 0..16u32 {
        let team = 1 + slot % 2;
        game.handle_line(
            &format!(
                "  0:01 ClientUserinfo: {} \\ip\\10.0.0.{}:27960\\name\\P{}\\cl_guid\\GUID{:04}",
                slot, slot, slot, slot
            ),
            0,
        );
        game.handle_line(
            &format!("  0:01 ClientUserinfoChanged: {} n\\P{}\\t\\{}", slot, slot, team),
            0,
        );
    }

    let events: Vec<String> = (0..16u32)
        .flat_map(|slot| {
            let victim = (slot + 1) % 16;
            [
                format!("  1:00 Hit: {} {} 5 19: P hit P", victim, slot),
                format!("  1:00 Kill: {} {} 19: P killed P by UT_MOD_LR300", slot, victim),
            ]
        })
        .collect();

    let iterations = 1_000;
    let start = Instant::now();
    for i in 0..iterations {
        for line in &events {
            game.handle_line(line, i);
        }
        game.handle_line("  5:00 Warmup:", i);
    }

    let duration = start.elapsed();
    let lines = iterations as usize * (events.len() + 1);
    println!(
        "Round dispatch: {} lines in {:?} ({:.2} μs/line)",
        lines,
        duration,
        duration.as_micros() as f64 / lines as f64
    );

    assert_eq!(game.registry().connected_count(), 16);
    // Should complete in under 3 seconds
    assert!(duration.as_millis() < 3000);
}

/// Benchmarks chat wrapping of long broadcast texts
#[test]
fn benchmark_message_wrapping() {
    let text = "^7Players matching a: ^3Alice [^21^3], ^3Andrea [^22^3], ^3Anna [^23^3] ".repeat(20);
    let iterations = 10_000;
    let start = Instant::now();

    let mut lines = 0;
    for _ in 0..iterations {
        lines += wrap(&text, SAY_WIDTH).len();
    }

    let duration = start.elapsed();
    println!(
        "Message wrapping: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(lines >= iterations * 10);
    assert!(duration.as_millis() < 2000);
}
