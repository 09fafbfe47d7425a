//! Sensor interfaces for the agent
//!
//! The transport hands over records that an external lexer has already
//! split into a tree of atoms and lists. This module maps the known record
//! shapes onto typed messages.
//!
//! The server reports directions clockwise-positive in a y-down frame; the
//! core works counter-clockwise in a y-up frame, so every direction is
//! negated on the way in.

use crate::common::types::{Degrees, Tick};
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One node of a tokenized sensor record
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Atom(String),
    List(Vec<Token>),
}

impl Token {
    pub fn atom(text: impl Into<String>) -> Self {
        Token::Atom(text.into())
    }

    pub fn list(items: Vec<Token>) -> Self {
        Token::List(items)
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Token::Atom(text) => Some(text),
            Token::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Token]> {
        match self {
            Token::List(items) => Some(items),
            Token::Atom(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_atom().and_then(|text| text.parse::<f64>().ok())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Atom(text) => write!(f, "{}", text),
            Token::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Width of the visual cone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewWidth {
    Narrow,
    Normal,
    Wide,
}

impl ViewWidth {
    pub fn keyword(&self) -> &'static str {
        match self {
            ViewWidth::Narrow => "narrow",
            ViewWidth::Normal => "normal",
            ViewWidth::Wide => "wide",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "narrow" => Some(ViewWidth::Narrow),
            "normal" => Some(ViewWidth::Normal),
            "wide" => Some(ViewWidth::Wide),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewQuality {
    High,
    Low,
}

/// Rates of change the server attaches to close objects
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeRates {
    pub distance_change: f64,
    pub direction_change: Degrees,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSighting {
    pub id: String,
    /// Missing for markers too far away to range
    pub distance: Option<f64>,
    /// Relative to the head
    pub direction: Degrees,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectSighting {
    pub distance: f64,
    pub direction: Degrees,
    pub change: Option<ChangeRates>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSighting {
    pub team: Option<String>,
    pub unum: Option<u8>,
    pub goalie: bool,
    pub sighting: ObjectSighting,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeeMessage {
    pub tick: Tick,
    pub landmarks: Vec<LandmarkSighting>,
    pub ball: Option<ObjectSighting>,
    pub players: Vec<PlayerSighting>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodySense {
    pub tick: Tick,
    pub view_quality: ViewQuality,
    pub view_width: ViewWidth,
    pub stamina: f64,
    pub effort: f64,
    pub speed: f64,
    pub head_angle: Degrees,
    pub kick_count: u32,
    pub dash_count: u32,
    pub turn_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HearMessage {
    Referee { tick: Tick, play_mode: String },
    SelfEcho { tick: Tick },
    Player { tick: Tick, direction: Degrees, text: String },
}

/// A sensor record after interpretation
#[derive(Debug, Clone, PartialEq)]
pub enum SensorMessage {
    Init { side: Side, unum: u8, play_mode: String },
    Hear(HearMessage),
    SenseBody(BodySense),
    See(SeeMessage),
}

impl SensorMessage {
    pub fn tick(&self) -> Option<Tick> {
        match self {
            SensorMessage::Init { .. } => None,
            SensorMessage::Hear(HearMessage::Referee { tick, .. })
            | SensorMessage::Hear(HearMessage::SelfEcho { tick })
            | SensorMessage::Hear(HearMessage::Player { tick, .. }) => Some(*tick),
            SensorMessage::SenseBody(body) => Some(body.tick),
            SensorMessage::See(see) => Some(see.tick),
        }
    }
}

fn malformed(record: &Token, what: &str) -> CoreError {
    CoreError::MalformedInput(format!("{}: {}", what, record))
}

fn field<'a>(items: &'a [Token], index: usize, record: &Token, what: &str) -> CoreResult<&'a Token> {
    items.get(index).ok_or_else(|| malformed(record, what))
}

fn number(token: &Token, record: &Token, what: &str) -> CoreResult<f64> {
    token.as_f64().ok_or_else(|| malformed(record, what))
}

fn tick_of(token: &Token, record: &Token) -> CoreResult<Tick> {
    token
        .as_atom()
        .and_then(|text| text.parse::<Tick>().ok())
        .ok_or_else(|| malformed(record, "bad time stamp"))
}

/// Map a tokenized record onto a [`SensorMessage`]
pub fn interpret(record: &Token) -> CoreResult<SensorMessage> {
    let items = record
        .as_list()
        .ok_or_else(|| malformed(record, "record is not a list"))?;
    let head = items
        .first()
        .and_then(Token::as_atom)
        .ok_or_else(|| malformed(record, "record has no keyword"))?;

    match head {
        "init" => interpret_init(items, record),
        "hear" => interpret_hear(items, record).map(SensorMessage::Hear),
        "sense_body" => interpret_sense_body(items, record).map(SensorMessage::SenseBody),
        "see" => interpret_see(items, record).map(SensorMessage::See),
        _ => Err(malformed(record, "unknown record")),
    }
}

fn interpret_init(items: &[Token], record: &Token) -> CoreResult<SensorMessage> {
    let side = match field(items, 1, record, "missing side")?.as_atom() {
        Some("l") => Side::Left,
        Some("r") => Side::Right,
        _ => return Err(malformed(record, "bad side")),
    };
    let unum = field(items, 2, record, "missing uniform number")?
        .as_atom()
        .and_then(|text| text.parse::<u8>().ok())
        .ok_or_else(|| malformed(record, "bad uniform number"))?;
    let play_mode = items
        .get(3)
        .and_then(Token::as_atom)
        .unwrap_or("before_kick_off")
        .to_string();

    Ok(SensorMessage::Init {
        side,
        unum,
        play_mode,
    })
}

fn interpret_hear(items: &[Token], record: &Token) -> CoreResult<HearMessage> {
    let tick = tick_of(field(items, 1, record, "missing time")?, record)?;
    let sender = field(items, 2, record, "missing sender")?;

    match sender.as_atom() {
        Some("referee") => {
            let play_mode = field(items, 3, record, "missing play mode")?
                .as_atom()
                .ok_or_else(|| malformed(record, "bad play mode"))?
                .to_string();
            Ok(HearMessage::Referee { tick, play_mode })
        }
        Some("self") => Ok(HearMessage::SelfEcho { tick }),
        Some(_) => {
            let direction = -number(sender, record, "bad sender direction")?;
            let text = items[3..]
                .iter()
                .map(|token| token.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            Ok(HearMessage::Player {
                tick,
                direction,
                text,
            })
        }
        None => Err(malformed(record, "bad sender")),
    }
}

fn interpret_sense_body(items: &[Token], record: &Token) -> CoreResult<BodySense> {
    let tick = tick_of(field(items, 1, record, "missing time")?, record)?;

    let mut view = None;
    let mut stamina = None;
    let mut speed = None;
    let mut head_angle = 0.0;
    let mut counts = [0u32; 3];

    for entry in &items[2..] {
        let Some(parts) = entry.as_list() else {
            return Err(malformed(record, "sense_body entry is not a list"));
        };
        let Some(key) = parts.first().and_then(Token::as_atom) else {
            continue;
        };
        match key {
            "view_mode" => {
                let quality = match parts.get(1).and_then(Token::as_atom) {
                    Some("high") => ViewQuality::High,
                    Some("low") => ViewQuality::Low,
                    _ => return Err(malformed(record, "bad view quality")),
                };
                let width = parts
                    .get(2)
                    .and_then(Token::as_atom)
                    .and_then(ViewWidth::parse)
                    .ok_or_else(|| malformed(record, "bad view width"))?;
                view = Some((quality, width));
            }
            "stamina" => {
                let value = number(field(parts, 1, record, "missing stamina")?, record, "bad stamina")?;
                let effort = number(field(parts, 2, record, "missing effort")?, record, "bad effort")?;
                stamina = Some((value, effort));
            }
            "speed" => {
                speed = Some(number(field(parts, 1, record, "missing speed")?, record, "bad speed")?);
            }
            "head_angle" => {
                head_angle = -number(field(parts, 1, record, "missing head angle")?, record, "bad head angle")?;
            }
            "kick" | "dash" | "turn" => {
                let value = number(field(parts, 1, record, "missing count")?, record, "bad count")?;
                let slot = match key {
                    "kick" => 0,
                    "dash" => 1,
                    _ => 2,
                };
                counts[slot] = value.max(0.0) as u32;
            }
            _ => {}
        }
    }

    let (view_quality, view_width) = view.ok_or_else(|| malformed(record, "missing view_mode"))?;
    let (stamina, effort) = stamina.ok_or_else(|| malformed(record, "missing stamina"))?;
    let speed = speed.ok_or_else(|| malformed(record, "missing speed"))?;

    Ok(BodySense {
        tick,
        view_quality,
        view_width,
        stamina,
        effort,
        speed,
        head_angle,
        kick_count: counts[0],
        dash_count: counts[1],
        turn_count: counts[2],
    })
}

enum ObjectKind {
    Landmark(String),
    Ball,
    Player {
        team: Option<String>,
        unum: Option<u8>,
        goalie: bool,
    },
    Ignored,
}

fn object_kind(name: &[Token], record: &Token) -> CoreResult<ObjectKind> {
    let words: Vec<&str> = name.iter().filter_map(Token::as_atom).collect();
    let Some((&kind, rest)) = words.split_first() else {
        return Err(malformed(record, "object without a name"));
    };

    let kind = match kind {
        "flag" | "f" | "F" => ObjectKind::Landmark(rest.concat()),
        "goal" | "g" | "G" => ObjectKind::Landmark(format!("g{}", rest.concat())),
        "ball" | "b" | "B" => ObjectKind::Ball,
        "player" | "p" | "P" => {
            let team = rest.first().map(|team| team.trim_matches('"').to_string());
            let unum = rest.get(1).and_then(|unum| unum.parse::<u8>().ok());
            let goalie = rest.get(2) == Some(&"goalie");
            ObjectKind::Player { team, unum, goalie }
        }
        _ => ObjectKind::Ignored,
    };
    Ok(kind)
}

fn interpret_see(items: &[Token], record: &Token) -> CoreResult<SeeMessage> {
    let tick = tick_of(field(items, 1, record, "missing time")?, record)?;
    let mut see = SeeMessage {
        tick,
        ..SeeMessage::default()
    };

    for entry in &items[2..] {
        let parts = entry
            .as_list()
            .ok_or_else(|| malformed(record, "see entry is not a list"))?;
        let name = parts
            .first()
            .and_then(Token::as_list)
            .ok_or_else(|| malformed(record, "see entry without object name"))?;
        let values = parts[1..]
            .iter()
            .map(|token| number(token, record, "bad see value"))
            .collect::<CoreResult<Vec<f64>>>()?;

        // One value is a bare direction, two or more start with distance
        let (distance, direction) = match values.as_slice() {
            [direction] => (None, -*direction),
            [distance, direction, ..] => (Some(*distance), -*direction),
            [] => return Err(malformed(record, "see entry without values")),
        };
        let change = match values.as_slice() {
            [_, _, distance_change, direction_change, ..] => Some(ChangeRates {
                distance_change: *distance_change,
                direction_change: -*direction_change,
            }),
            _ => None,
        };

        match object_kind(name, record)? {
            ObjectKind::Landmark(id) => see.landmarks.push(LandmarkSighting {
                id,
                distance,
                direction,
            }),
            ObjectKind::Ball => {
                if let Some(distance) = distance {
                    see.ball = Some(ObjectSighting {
                        distance,
                        direction,
                        change,
                    });
                }
            }
            ObjectKind::Player { team, unum, goalie } => {
                if let Some(distance) = distance {
                    see.players.push(PlayerSighting {
                        team,
                        unum,
                        goalie,
                        sighting: ObjectSighting {
                            distance,
                            direction,
                            change,
                        },
                    });
                }
            }
            ObjectKind::Ignored => {}
        }
    }

    Ok(see)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn atoms(words: &[&str]) -> Vec<Token> {
        words.iter().map(|word| Token::atom(*word)).collect()
    }

    pub(crate) fn sighting(name: &[&str], values: &[&str]) -> Token {
        let mut items = vec![Token::list(atoms(name))];
        items.extend(atoms(values));
        Token::list(items)
    }

    #[test]
    fn referee_message_sets_play_mode() {
        let record = Token::list(atoms(&["hear", "0", "referee", "kick_off_l"]));
        let message = interpret(&record).unwrap();
        assert_eq!(
            message,
            SensorMessage::Hear(HearMessage::Referee {
                tick: 0,
                play_mode: "kick_off_l".to_string()
            })
        );
    }

    #[test]
    fn init_carries_side_and_number() {
        let record = Token::list(atoms(&["init", "r", "7", "before_kick_off"]));
        match interpret(&record).unwrap() {
            SensorMessage::Init { side, unum, .. } => {
                assert_eq!(side, Side::Right);
                assert_eq!(unum, 7);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn sense_body_fields() {
        let record = Token::list(vec![
            Token::atom("sense_body"),
            Token::atom("12"),
            Token::list(atoms(&["view_mode", "high", "normal"])),
            Token::list(atoms(&["stamina", "8000", "1", "130600"])),
            Token::list(atoms(&["speed", "0.42", "0"])),
            Token::list(atoms(&["head_angle", "30"])),
            Token::list(atoms(&["kick", "1"])),
            Token::list(atoms(&["dash", "5"])),
            Token::list(atoms(&["turn", "3"])),
            Token::list(atoms(&["say", "0"])),
        ]);
        let SensorMessage::SenseBody(body) = interpret(&record).unwrap() else {
            panic!("expected sense_body");
        };
        assert_eq!(body.tick, 12);
        assert_eq!(body.view_width, ViewWidth::Normal);
        assert_eq!(body.stamina, 8000.0);
        assert_eq!(body.speed, 0.42);
        assert_eq!(body.head_angle, -30.0);
        assert_eq!((body.kick_count, body.dash_count, body.turn_count), (1, 5, 3));
    }

    #[test]
    fn see_splits_objects() {
        let record = Token::list(vec![
            Token::atom("see"),
            Token::atom("3"),
            sighting(&["flag", "r", "b"], &["48.9", "29"]),
            sighting(&["goal", "r"], &["43.8", "-13"]),
            sighting(&["flag", "p", "r", "c"], &["27.9", "-21", "0", "0"]),
            sighting(&["ball"], &["5", "10", "-0.5", "1"]),
            sighting(&["player", "Team2", "4"], &["0.5", "-28", "0", "0"]),
            sighting(&["player"], &["60.3", "7"]),
            sighting(&["line", "r"], &["42.5", "90"]),
            sighting(&["F"], &["40"]),
        ]);
        let SensorMessage::See(see) = interpret(&record).unwrap() else {
            panic!("expected see");
        };
        let ids: Vec<&str> = see.landmarks.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["rb", "gr", "prc", ""]);
        assert_eq!(see.landmarks[0].direction, -29.0);
        assert_eq!(see.landmarks[3].distance, None);

        let ball = see.ball.unwrap();
        assert_eq!(ball.distance, 5.0);
        assert_eq!(ball.direction, -10.0);
        assert_eq!(ball.change.unwrap().direction_change, -1.0);

        assert_eq!(see.players.len(), 2);
        assert_eq!(see.players[0].team.as_deref(), Some("Team2"));
        assert_eq!(see.players[0].unum, Some(4));
        assert_eq!(see.players[1].team, None);
    }

    #[test]
    fn unknown_shapes_are_malformed() {
        let record = Token::list(atoms(&["score", "10", "1", "0"]));
        assert!(matches!(interpret(&record), Err(CoreError::MalformedInput(_))));

        let bad_number = Token::list(vec![
            Token::atom("see"),
            Token::atom("3"),
            sighting(&["ball"], &["far", "10"]),
        ]);
        assert!(matches!(interpret(&bad_number), Err(CoreError::MalformedInput(_))));

        assert!(matches!(interpret(&Token::atom("see")), Err(CoreError::MalformedInput(_))));
    }
}
