use pitch_core::common::angle::{angle_diff, normalize_deg};
use pitch_core::common::Coordinate;
use pitch_core::config::AgentConfig;
use pitch_core::error::CoreError;
use pitch_core::perception::sensors::Token;
use pitch_core::PitchCore;

const AGENT: Coordinate = Coordinate::new(-20.0, 5.0);
const BALL: Coordinate = Coordinate::new(-10.0, 3.0);

fn atoms(words: &[&str]) -> Vec<Token> {
    words.iter().map(|word| Token::atom(*word)).collect()
}

fn entry(name: &[&str], point: Coordinate) -> Option<Token> {
    let offset = point - AGENT;
    let bearing = normalize_deg(offset.direction());
    if bearing.abs() > 45.0 {
        return None;
    }
    let mut items = vec![Token::list(atoms(name))];
    items.push(Token::atom(format!("{:.2}", offset.magnitude())));
    // Server directions are clockwise
    items.push(Token::atom(format!("{:.2}", -bearing)));
    Some(Token::list(items))
}

/// What the agent at AGENT, facing +x with the head straight, would see
fn see(config: &AgentConfig, tick: u32) -> Token {
    let mut items = vec![Token::atom("see"), Token::atom(tick.to_string())];
    for (id, position) in &config.landmarks {
        items.extend(entry(&["f", id.as_str()], *position));
    }
    items.extend(entry(&["b"], BALL));
    Token::list(items)
}

fn sense_body(tick: u32) -> Token {
    Token::list(vec![
        Token::atom("sense_body"),
        Token::atom(tick.to_string()),
        Token::list(atoms(&["view_mode", "high", "normal"])),
        Token::list(atoms(&["stamina", "8000", "1"])),
        Token::list(atoms(&["speed", "0", "0"])),
        Token::list(atoms(&["head_angle", "0"])),
    ])
}

fn ready_core() -> PitchCore {
    let mut core = PitchCore::new(AgentConfig::default());
    core.init().unwrap();
    core.apply_message(&Token::list(atoms(&["init", "l", "7", "play_on"])))
        .unwrap();
    core
}

#[test]
fn one_cycle_localizes_and_chases_the_ball() {
    let mut core = ready_core();
    let config = core.config().clone();
    core.apply_message(&sense_body(1)).unwrap();
    core.apply_message(&see(&config, 1)).unwrap();

    let batch = core.next_command_batch();

    let world = core.world();
    let position = world.position.get_copied(1, 0).expect("position fix");
    assert!(position.distance_to(&AGENT) < 0.5, "localized at {}", position);
    let heading = world.heading.get_copied(1, 0).expect("heading fix");
    assert!(angle_diff(0.0, heading).abs() < 1.0, "heading {}", heading);

    assert!(!batch.is_empty());
    assert!(
        batch[0].starts_with("(turn ") || batch[0].starts_with("(dash "),
        "batch {:?}",
        batch
    );
    assert!(core.last_outcome().plan.is_some());
}

#[test]
fn unknown_pose_turns_to_look_around() {
    let mut core = ready_core();
    core.apply_message(&sense_body(1)).unwrap();
    let batch = core.next_command_batch();
    assert!(batch.iter().any(|command| command.starts_with("(turn ")));
    assert!(batch.iter().any(|command| command == "(change_view wide high)"));
}

#[test]
fn malformed_record_is_dropped() {
    let mut core = ready_core();
    let before = core.world().sim_time;
    let result = core.apply_message(&Token::list(atoms(&["nonsense", "12"])));
    assert!(matches!(result, Err(CoreError::MalformedInput(_))));
    assert_eq!(core.world().sim_time, before);
}

#[test]
fn inactive_core_sends_nothing() {
    let mut core = PitchCore::new(AgentConfig::default());
    assert!(core.next_command_batch().is_empty());

    core.init().unwrap();
    core.shutdown().unwrap();
    assert!(!core.is_active());
    assert!(core.next_command_batch().is_empty());
}

#[test]
fn sample_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/agent.toml");
    let config = AgentConfig::load(path).unwrap();
    assert!(config.strategy.enabled);
    assert_eq!(config.landmarks.len(), 55);
}
