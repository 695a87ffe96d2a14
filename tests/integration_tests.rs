//! Integration tests for the moderation bot
//!
//! These tests replay real log lines through the coordinator and run the
//! full control loop against a fake game server console.

use server::config::Config;
use server::geo::NoGeo;
use server::storage::{FileStorage, MemoryStorage, Storage};
use server::Game;
use shared::{Action, GameKind, Role};
use std::time::Duration;

const NOW: u64 = 1_700_000_000;

fn live_game(storage: Box<dyn Storage>) -> Game {
    let mut game = Game::new(Config::default(), storage, Box::new(NoGeo));
    game.go_live(Vec::new());
    game
}

fn feed(game: &mut Game, lines: &[String]) -> Vec<Action> {
    lines
        .iter()
        .flat_map(|line| game.handle_line(line, NOW))
        .collect()
}

fn connect_lines(slot: u32, name: &str, guid: &str, team: u32) -> Vec<String> {
    vec![
        format!(
            "  0:01 ClientUserinfo: {} \\ip\\172.16.0.{}:27960\\name\\{}\\racered\\2\\cl_guid\\{}\\gear\\GZAAVWT",
            slot, slot, name, guid
        ),
        format!(
            "  0:01 ClientUserinfoChanged: {} n\\{}\\t\\{}\\r\\1\\tl\\0",
            slot, name, team
        ),
        format!("  0:01 ClientBegin: {}", slot),
    ]
}

fn team_kills(killer: u32, victim: u32, count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            format!(
                "  1:00 Kill: {} {} 19: Attacker killed Victim by UT_MOD_LR300",
                killer, victim
            )
        })
        .collect()
}

/// GAME LOGIC INTEGRATION TESTS
mod game_logic_tests {
    use super::*;

    /// Two team-kill kicks within the point window end in a ban that sticks
    #[test]
    fn repeated_team_kill_kicks_lead_to_ban() {
        let mut game = live_game(Box::new(MemoryStorage::new()));
        feed(
            &mut game,
            &["  0:00 InitGame: \\g_gametype\\4\\g_modversion\\4.2.023\\mapname\\ut4_uptown".to_string()],
        );
        feed(&mut game, &connect_lines(1, "Alice", "AAAA1111", 1));
        feed(&mut game, &connect_lines(2, "Bob", "BBBB2222", 1));

        let first = feed(&mut game, &team_kills(1, 2, 5));
        assert!(first.contains(&Action::Kick(1)));
        assert!(!first.iter().any(|a| matches!(a, Action::Ban { .. })));

        feed(&mut game, &["  1:10 ClientDisconnect: 1".to_string()]);
        feed(&mut game, &connect_lines(1, "Alice", "AAAA1111", 1));
        let second = feed(&mut game, &team_kills(1, 2, 5));

        let ban = second.iter().find_map(|action| match action {
            Action::Ban {
                slot,
                guid,
                duration_secs,
                reason,
            } => Some((*slot, guid.clone(), *duration_secs, reason.clone())),
            _ => None,
        });
        assert_eq!(
            ban,
            Some((1, "AAAA1111".to_string(), 2700, "tk, auto-kick".to_string()))
        );
        assert!(second.contains(&Action::say(
            "Alice ^7banned for ^145 minutes ^7for too many warnings"
        )));

        feed(&mut game, &["  1:20 ClientDisconnect: 1".to_string()]);
        let reconnect = feed(&mut game, &connect_lines(1, "Alice", "AAAA1111", 1));
        assert!(reconnect.contains(&Action::say("^7Alice ^1banned ^7(ID #1)")));
        assert!(reconnect.contains(&Action::Kick(1)));
    }

    /// Replays a whole round and checks the end-of-round summary
    #[test]
    fn full_round_replay() {
        let mut game = live_game(Box::new(MemoryStorage::new()));
        let mut lines = vec![
            "  0:00 InitGame: \\sv_hostname\\Test\\g_gametype\\7\\g_modversion\\4.2.023\\mapname\\ut4_turnpike".to_string(),
            "  0:00 Warmup:".to_string(),
        ];
        lines.extend(connect_lines(0, "Red", "RRRR0000", 1));
        lines.extend(connect_lines(1, "Blue", "BBBB1111", 2));
        lines.extend([
            "  0:20 InitRound: \\g_gametype\\7".to_string(),
            "  0:30 Hit: 1 0 1 19: Red hit Blue in the Head".to_string(),
            "  0:31 Hit: 1 0 1 19: Red hit Blue in the Head".to_string(),
            "  0:32 Kill: 0 1 19: Red killed Blue by UT_MOD_LR300".to_string(),
            "  0:40 Kill: 0 1 19: Red killed Blue by UT_MOD_LR300".to_string(),
            "  0:50 Flag: 1 2: team_CTF_redflag".to_string(),
            "  0:55 Flag: 1 2: team_CTF_redflag".to_string(),
            "  1:00 Kill: 1022 0 22: <non-client> killed Red by UT_MOD_HK69".to_string(),
            "  2:00 Exit: Flaglimit hit.".to_string(),
        ]);

        let actions = feed(&mut game, &lines);

        assert_eq!(game.state().kind, GameKind::CaptureTheFlag);
        assert!(actions.contains(&Action::say("^1Red ^7has 2 headshots (100 percent)")));
        assert!(actions.contains(&Action::say(
            "^1AWARDS: ^7Blue: ^22 ^4caps ^7- ^7Red: ^22 ^3kills ^7- ^7Red: ^22 ^6streaks ^7- ^7Red: ^22 ^1heads"
        )));
        assert!(actions.contains(&Action::tell(
            0,
            "^7Stats Red: ^7K ^22 ^7D ^31 ^7HS ^12 ^7TK ^10"
        )));
    }

    /// Nothing leaves the coordinator while the backlog is replayed
    #[test]
    fn backlog_is_silent() {
        let mut game = Game::new(
            Config::default(),
            Box::new(MemoryStorage::new()),
            Box::new(NoGeo),
        );
        let mut lines = connect_lines(5, "Cheater", "KEMFEW00", 1);
        lines.extend(team_kills(5, 5, 1));

        assert!(feed(&mut game, &lines).is_empty());
        assert!(!game.is_live());
        assert!(game.registry().contains(5));
    }
}

/// PERSISTENCE INTEGRATION TESTS
mod storage_tests {
    use super::*;

    #[test]
    fn registration_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.db");

        {
            let storage = FileStorage::open(&path).unwrap();
            let mut game = live_game(Box::new(storage));
            feed(&mut game, &connect_lines(3, "Alice", "AAAA1111", 1));
            let actions = feed(&mut game, &["  0:10 say: 3 Alice: !register".to_string()]);
            assert_eq!(actions, vec![Action::tell(3, "Alice ^7put in group User")]);
        }

        // the snapshot is plain bincode of the in-memory store
        let bytes = std::fs::read(&path).unwrap();
        let snapshot: MemoryStorage = bincode::deserialize(&bytes).unwrap();
        assert_eq!(snapshot.is_registered("AAAA1111").unwrap(), Some(Role::User));

        let storage = FileStorage::open(&path).unwrap();
        let mut game = live_game(Box::new(storage));
        let actions = feed(&mut game, &connect_lines(3, "Alice", "AAAA1111", 1));

        let welcome = actions.iter().find_map(|action| match action {
            Action::TellPlayer {
                slot: 3,
                text,
                private_tag: false,
            } => Some(text.clone()),
            _ => None,
        });
        let welcome = welcome.expect("registered player is welcomed");
        assert!(welcome.starts_with("^7[^2Authed^7] Welcome back Alice, you are ^2User^7, last visit "));
    }
}

/// NETWORK INTEGRATION TESTS
mod network_tests {
    use super::*;
    use server::network::Server;
    use server::rcon::{frame, RconClient};
    use std::fs::OpenOptions;
    use std::io::Write;
    use tokio::net::UdpSocket;
    use tokio::time::{sleep, timeout};

    /// Tests a status query against a fake console over a real UDP socket
    #[tokio::test]
    async fn status_query_round_trip() {
        let console = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = console.local_addr().unwrap().port();

        let fake_console = tokio::spawn(async move {
            let mut buffer = [0u8; 1024];
            let (len, peer) = console.recv_from(&mut buffer).await.unwrap();
            assert_eq!(&buffer[..len], frame("secret", "status").as_slice());
            let reply = b"\xff\xff\xff\xffprint\nmap: ut4_abbey\n\
num score ping name            lastmsg address               qport rate\n\
--- ----- ---- --------------- ------- --------------------- ----- -----\n\
  0     5   48 Alice                 0 10.0.0.1:27960        1234 25000\n\
  1     0  999 Bob                   0 10.0.0.2:27960        4321 25000\n";
            console.send_to(reply, peer).await.unwrap();
        });

        let client = tokio_test::assert_ok!(
            RconClient::connect("127.0.0.1", port, "secret", Duration::from_secs(1)).await
        );
        let pings = tokio_test::assert_ok!(client.status().await);
        fake_console.await.unwrap();

        assert_eq!(pings.len(), 2);
        assert_eq!((pings[0].slot, pings[0].ping), (0, 48));
        assert_eq!((pings[1].slot, pings[1].ping), (1, 999));
    }

    /// Runs the control loop: recovery, going live, then a new line
    #[tokio::test]
    async fn server_kicks_cheater_appended_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("games.log");
        std::fs::write(
            &log_path,
            "  0:00 InitGame: \\g_gametype\\4\\g_modversion\\4.2.023\\mapname\\ut4_abbey\n  0:01 Warmup:\n",
        )
        .unwrap();

        let console = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = Config {
            log_file: log_path.clone(),
            rcon_port: console.local_addr().unwrap().port(),
            rcon_password: "secret".to_string(),
            poll_interval_ms: 10,
            rcon_delay_ms: 1,
            ..Config::default()
        };
        let mut server = Server::new(config, Box::new(MemoryStorage::new()), Box::new(NoGeo))
            .await
            .unwrap();
        let game = server.game();

        let received = tokio::select! {
            result = server.run() => panic!("server stopped: {:?}", result.err()),
            received = async {
                sleep(Duration::from_millis(200)).await;
                let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
                writeln!(
                    file,
                    "  0:05 ClientUserinfo: 3 \\ip\\1.2.3.4:1337\\name\\Cheat\\cl_guid\\ABC"
                )
                .unwrap();

                let mut buffer = [0u8; 1024];
                let mut datagrams = Vec::new();
                for _ in 0..2 {
                    let len = timeout(Duration::from_secs(2), console.recv(&mut buffer))
                        .await
                        .unwrap()
                        .unwrap();
                    datagrams.push(buffer[..len].to_vec());
                }
                datagrams
            } => received,
        };

        assert_eq!(
            received,
            vec![
                frame("secret", "say ^3Cheater Port detected for Cheat -> Player kicked"),
                frame("secret", "kick 3"),
            ]
        );
        let game = game.read().await;
        assert!(game.is_live());
        assert_eq!(game.state().kind, GameKind::TeamSurvivor);
        assert!(game.registry().contains(3));
    }
}
