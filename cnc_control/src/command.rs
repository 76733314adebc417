//! Command frames: tokenizer and dispatcher.
//!
//! A frame is one line of `<letter><number>` words, e.g.
//! `N12 G1 X1500 Y-200 F600 T40`. Text after `;` is a comment. Words may be
//! separated by whitespace or written back to back.
//!
//! Coordinates (`X`, `Y`, `Z`) and the arc height (`D`) are sent in
//! hundredths of a unit. Feeds (`F`, `P`, `L`) are units/min and `T` is the
//! acceleration in units/s² for motion words or the tool number for
//! `M3`/`M5`.
//!
//! | Command | Action |
//! |---------|--------|
//! | `G0`/`G1` | straight line by `X Y Z` |
//! | `G2`/`G3` | clockwise/counter-clockwise arc to the in-plane coordinates, height `D`, plane `G17`/`G18`/`G19` |
//! | `M3`/`M5` | tool `T` on/off |
//! | `M114` | position report |
//! | `M119` | endstop report |
//! | `M800`/`M801` | unlock/lock |
//! | `M802`/`M803` | fail on endstops off/on |
//! | `M995`/`M996` | break on probe off/on |
//! | `M997` | zero position and reset step flags |
//! | `M998` | reset step flags |
//!
//! An arc frame carrying a coordinate for the axis outside its plane (e.g.
//! `Z` under `G17`) is rejected as a bad value.
//!
//! Protocol errors (missing line number, unknown command, full queue) lock
//! the planner so a confused host cannot keep moving the machine.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, warn};

use cnc_common::axis::{Axis, Endstops};
use cnc_common::config::MachineConfig;
use cnc_common::consts::{AXES, MAX_FRAME_WORDS};
use cnc_common::error::PlannerError;
use cnc_common::events::{ActionId, EventSink};
use cnc_common::hal::StepperHal;

use crate::moves::FeedProfile;
use crate::moves::arc::{ArcGeometry, ArcPlane, Rotation};
use crate::planner::Planner;

/// Wire coordinates are hundredths of a unit.
const COORD_SCALE: f64 = 100.0;

// ─── Tokenizer ──────────────────────────────────────────────────────

/// Frame-level syntax error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed word '{0}'")]
    MalformedWord(String),

    #[error("too many words (max {MAX_FRAME_WORDS})")]
    TooManyWords,
}

/// One `<letter><number>` word. The letter is upper case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    pub letter: char,
    pub value: f64,
}

impl Word {
    /// Value as an integer code, `None` if it has a fractional part.
    pub fn code(&self) -> Option<i32> {
        if self.value.fract() == 0.0 && self.value.abs() <= f64::from(i32::MAX) {
            Some(self.value as i32)
        } else {
            None
        }
    }
}

/// Tokenized command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    words: heapless::Vec<Word, MAX_FRAME_WORDS>,
}

impl Frame {
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl FromStr for Frame {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let text = line.split(';').next().unwrap_or_default();
        let bytes = text.as_bytes();
        let mut frame = Frame::default();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i].is_ascii_whitespace() {
                i += 1;
                continue;
            }
            let start = i;
            if !bytes[i].is_ascii_alphabetic() {
                return Err(ParseError::MalformedWord(fragment(text, start)));
            }
            let letter = char::from(bytes[i].to_ascii_uppercase());
            i += 1;
            let num_start = i;
            while i < bytes.len()
                && (bytes[i].is_ascii_digit()
                    || bytes[i] == b'.'
                    || (i == num_start && (bytes[i] == b'-' || bytes[i] == b'+')))
            {
                i += 1;
            }
            let value = text[num_start..i]
                .parse::<f64>()
                .map_err(|_| ParseError::MalformedWord(fragment(text, start)))?;
            frame
                .words
                .push(Word { letter, value })
                .map_err(|_| ParseError::TooManyWords)?;
        }
        Ok(frame)
    }
}

/// The whitespace-delimited fragment starting at `start`, for messages.
fn fragment(text: &str, start: usize) -> String {
    text[start..]
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

// ─── Replies & Errors ───────────────────────────────────────────────

/// Successful reply to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Frame handled; nothing else will follow.
    Ok(ActionId),
    /// Handed to the planner; lifecycle events follow.
    Planned(ActionId),
    /// Current position in steps.
    Position(ActionId, [i32; AXES]),
    /// Current endstop inputs.
    Endstops(ActionId, Endstops),
}

impl Reply {
    pub const fn id(&self) -> ActionId {
        match *self {
            Reply::Ok(id) | Reply::Planned(id) | Reply::Position(id, _) | Reply::Endstops(id, _) => {
                id
            }
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok(id) => write!(f, "ok N{id}"),
            Reply::Planned(id) => write!(f, "planned N{id}"),
            Reply::Position(id, [x, y, z]) => write!(f, "ok N{id} X:{x} Y:{y} Z:{z}"),
            Reply::Endstops(id, e) => write!(f, "ok N{id} {e}"),
        }
    }
}

/// Frame rejected. The planner may have been locked as a side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("no command number specified")]
    MissingLineNumber,

    #[error("unknown command {letter}{code}")]
    UnknownCommand {
        id: ActionId,
        letter: char,
        code: String,
    },

    #[error("bad value for {letter}")]
    BadValue { id: ActionId, letter: char },

    #[error("{source}")]
    Rejected {
        id: ActionId,
        #[source]
        source: PlannerError,
    },

    #[error("machine is moving")]
    Busy { id: ActionId },
}

impl CommandError {
    /// Line number the error refers to, `None` when it was never read.
    pub const fn id(&self) -> Option<ActionId> {
        match *self {
            CommandError::Parse(_) | CommandError::MissingLineNumber => None,
            CommandError::UnknownCommand { id, .. }
            | CommandError::BadValue { id, .. }
            | CommandError::Rejected { id, .. }
            | CommandError::Busy { id } => Some(id),
        }
    }

    /// Whether handling this error locked the planner.
    pub const fn locks(&self) -> bool {
        !matches!(
            self,
            CommandError::Rejected {
                source: PlannerError::Locked,
                ..
            } | CommandError::Busy { .. }
        )
    }
}

// ─── Dispatcher ─────────────────────────────────────────────────────

/// Routes frames to planner operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dispatcher {
    acc_default: f64,
}

impl Dispatcher {
    pub fn new(machine: &MachineConfig) -> Self {
        Self {
            acc_default: machine.acc_default,
        }
    }

    /// Tokenize and execute one line.
    pub fn execute_line<H: StepperHal, E: EventSink, const N: usize>(
        &self,
        planner: &mut Planner<H, E, N>,
        line: &str,
    ) -> Result<Reply, CommandError> {
        match line.parse::<Frame>() {
            Ok(frame) => self.execute(planner, &frame),
            Err(e) => {
                warn!(line, error = %e, "frame rejected");
                planner.lock();
                Err(e.into())
            }
        }
    }

    /// Execute one tokenized frame.
    pub fn execute<H: StepperHal, E: EventSink, const N: usize>(
        &self,
        planner: &mut Planner<H, E, N>,
        frame: &Frame,
    ) -> Result<Reply, CommandError> {
        let result = self.route(planner, frame);
        if let Err(e) = &result {
            warn!(id = e.id(), error = %e, "command failed");
            if e.locks() {
                planner.lock();
            }
        }
        result
    }

    fn route<H: StepperHal, E: EventSink, const N: usize>(
        &self,
        planner: &mut Planner<H, E, N>,
        frame: &Frame,
    ) -> Result<Reply, CommandError> {
        let words = frame.words();
        let n = words.iter().take_while(|w| w.letter == 'N').count();
        let Some(number) = n.checked_sub(1).map(|i| words[i]) else {
            return Err(CommandError::MissingLineNumber);
        };
        let id = number.code().ok_or(CommandError::MissingLineNumber)?;
        let (cmd, params) = match &words[n..] {
            [] => return Ok(Reply::Ok(id)),
            [cmd, params @ ..] => (*cmd, params),
        };
        let unknown = || CommandError::UnknownCommand {
            id,
            letter: cmd.letter,
            code: format!("{}", cmd.value),
        };
        let code = cmd.code().ok_or_else(unknown)?;
        debug!(id, letter = %cmd.letter, code, "dispatch");

        match (cmd.letter, code) {
            ('G', 0 | 1) => {
                let (delta, profile) = self.motion_params(params);
                planner
                    .enqueue_line(delta, profile, id)
                    .map_err(|source| CommandError::Rejected { id, source })?;
                Ok(Reply::Planned(id))
            }
            ('G', 2 | 3) => {
                let (target, profile) = self.motion_params(params);
                let mut plane = ArcPlane::XY;
                let mut height = 0.0;
                let (mut a, mut b) = (0.0, 0.0);
                for w in params {
                    match (w.letter, w.code()) {
                        ('G', Some(17)) => plane = ArcPlane::XY,
                        ('G', Some(18)) => plane = ArcPlane::YZ,
                        ('G', Some(19)) => plane = ArcPlane::ZX,
                        ('D', _) => height = w.value / COORD_SCALE,
                        ('A', _) => a = w.value,
                        ('B', _) => b = w.value,
                        _ => {}
                    }
                }
                let (u, v) = plane.axes();
                // Axis indices sum to 3.
                let off_plane = Axis::ALL[3 - u.index() - v.index()].letter();
                if params.iter().any(|w| w.letter == off_plane) {
                    return Err(CommandError::BadValue {
                        id,
                        letter: off_plane,
                    });
                }
                let geometry = ArcGeometry {
                    start: [0.0, 0.0],
                    end: [target[u.index()], target[v.index()]],
                    height,
                    a,
                    b,
                    len: 0.0,
                    plane,
                    rotation: if code == 2 {
                        Rotation::Clockwise
                    } else {
                        Rotation::CounterClockwise
                    },
                };
                planner
                    .enqueue_arc(geometry, profile, id)
                    .map_err(|source| CommandError::Rejected { id, source })?;
                Ok(Reply::Planned(id))
            }
            ('M', 3 | 5) => {
                let mut tool = 0u8;
                if let Some(w) = params.iter().find(|w| w.letter == 'T') {
                    tool = w
                        .code()
                        .and_then(|c| u8::try_from(c).ok())
                        .ok_or(CommandError::BadValue { id, letter: 'T' })?;
                }
                planner
                    .enqueue_tool(tool, code == 3, id)
                    .map_err(|source| CommandError::Rejected { id, source })?;
                Ok(Reply::Planned(id))
            }
            ('M', 114) => Ok(Reply::Position(id, planner.position().pos)),
            ('M', 119) => Ok(Reply::Endstops(id, planner.read_endstops())),
            ('M', 800) => {
                planner.unlock();
                Ok(Reply::Ok(id))
            }
            ('M', 801) => {
                planner.lock();
                Ok(Reply::Ok(id))
            }
            ('M', 802 | 803) => {
                planner.set_fail_on_endstops(code == 803);
                Ok(Reply::Ok(id))
            }
            ('M', 995 | 996) => {
                planner.set_break_on_probe(code == 996);
                Ok(Reply::Ok(id))
            }
            ('M', 997) => {
                if !planner.set_position([0; AXES]) {
                    return Err(CommandError::Busy { id });
                }
                planner.reset_flags();
                Ok(Reply::Ok(id))
            }
            ('M', 998) => {
                planner.reset_flags();
                Ok(Reply::Ok(id))
            }
            _ => Err(unknown()),
        }
    }

    /// `X Y Z` (hundredths) and `F P L T` shared by lines and arcs.
    fn motion_params(&self, params: &[Word]) -> ([f64; AXES], FeedProfile) {
        let mut x = [0.0; AXES];
        let mut profile = FeedProfile {
            feed: 0.0,
            feed_in: 0.0,
            feed_out: 0.0,
            acceleration: self.acc_default,
        };
        for w in params {
            match w.letter {
                'X' => x[0] = w.value / COORD_SCALE,
                'Y' => x[1] = w.value / COORD_SCALE,
                'Z' => x[2] = w.value / COORD_SCALE,
                'F' => profile.feed = w.value,
                'P' => profile.feed_in = w.value,
                'L' => profile.feed_out = w.value,
                'T' => profile.acceleration = w.value,
                _ => {}
            }
        }
        (x, profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::Tick;
    use crate::sim::SimulatedSteppers;
    use cnc_common::events::{EventLog, HostEvent};

    type TestPlanner = Planner<SimulatedSteppers, EventLog, 4>;

    fn setup() -> (Dispatcher, TestPlanner) {
        let machine = MachineConfig {
            steps_per_unit: [1.0; AXES],
            feed_base: 1.0,
            ..MachineConfig::default()
        };
        let mut p = Planner::new(SimulatedSteppers::new(), EventLog::new(), &machine);
        p.unlock();
        (Dispatcher::new(&machine), p)
    }

    fn drain(p: &mut TestPlanner) {
        loop {
            p.pre_calculate();
            if p.tick() == Tick::Idle {
                break;
            }
        }
        p.report_states();
    }

    #[test]
    fn tokenizes_words() {
        let f: Frame = "n5 G1 X-150 y2.5 ; comment X9".parse().unwrap();
        let letters: Vec<char> = f.words().iter().map(|w| w.letter).collect();
        assert_eq!(letters, vec!['N', 'G', 'X', 'Y']);
        assert_eq!(f.words()[2].value, -150.0);
        assert_eq!(f.words()[3].value, 2.5);
    }

    #[test]
    fn tokenizes_glued_words() {
        let f: Frame = "N1G1X100Y-5".parse().unwrap();
        assert_eq!(f.words().len(), 4);
        assert_eq!(f.words()[3], Word { letter: 'Y', value: -5.0 });
    }

    #[test]
    fn rejects_malformed_words() {
        assert_eq!(
            "N1 G1 X".parse::<Frame>(),
            Err(ParseError::MalformedWord("X".into()))
        );
        assert_eq!(
            "N1 12".parse::<Frame>(),
            Err(ParseError::MalformedWord("12".into()))
        );
        let long = "X1 ".repeat(MAX_FRAME_WORDS + 1);
        assert_eq!(long.parse::<Frame>(), Err(ParseError::TooManyWords));
    }

    #[test]
    fn empty_and_comment_lines() {
        assert!("".parse::<Frame>().unwrap().is_empty());
        assert!("   ; just a note".parse::<Frame>().unwrap().is_empty());
    }

    #[test]
    fn word_code() {
        assert_eq!(Word { letter: 'G', value: 1.0 }.code(), Some(1));
        assert_eq!(Word { letter: 'G', value: 1.5 }.code(), None);
    }

    #[test]
    fn line_number_only_is_ok() {
        let (d, mut p) = setup();
        assert_eq!(d.execute_line(&mut p, "N4"), Ok(Reply::Ok(4)));
    }

    #[test]
    fn missing_line_number_locks() {
        let (d, mut p) = setup();
        assert_eq!(
            d.execute_line(&mut p, "G1 X100"),
            Err(CommandError::MissingLineNumber)
        );
        assert!(p.is_locked());
    }

    #[test]
    fn parse_error_locks() {
        let (d, mut p) = setup();
        let err = d.execute_line(&mut p, "N1 G1 X1..2").unwrap_err();
        assert!(matches!(err, CommandError::Parse(_)));
        assert_eq!(err.id(), None);
        assert!(p.is_locked());
    }

    #[test]
    fn unknown_command_locks() {
        let (d, mut p) = setup();
        let err = d.execute_line(&mut p, "N2 G42").unwrap_err();
        assert_eq!(err.to_string(), "unknown command G42");
        assert_eq!(err.id(), Some(2));
        assert!(p.is_locked());
    }

    #[test]
    fn line_in_hundredths() {
        let (d, mut p) = setup();
        assert_eq!(
            d.execute_line(&mut p, "N1 G1 X300 Y-200 F600"),
            Ok(Reply::Planned(1))
        );
        drain(&mut p);
        assert_eq!(p.position().pos, [3, -2, 0]);
        assert_eq!(p.events().terminal_ids(), vec![1]);
    }

    #[test]
    fn zero_line_reports_dropped() {
        let (d, mut p) = setup();
        assert_eq!(d.execute_line(&mut p, "N3 G0"), Ok(Reply::Planned(3)));
        assert_eq!(p.events().events(), &[HostEvent::Dropped(3)]);
    }

    #[test]
    fn arc_in_selected_plane() {
        let (d, mut p) = setup();
        // Half circle of radius 1 in ZX: from origin to Z+2.
        assert_eq!(
            d.execute_line(&mut p, "N1 G3 G19 Z200 D100 F600"),
            Ok(Reply::Planned(1))
        );
        drain(&mut p);
        assert_eq!(p.position().pos, [0, 0, 2]);
        assert_eq!(p.events().terminal_ids(), vec![1]);
    }

    #[test]
    fn arc_rejects_off_plane_coordinate() {
        let (d, mut p) = setup();
        assert_eq!(
            d.execute_line(&mut p, "N1 G2 X200 Z100 D50 F600"),
            Err(CommandError::BadValue { id: 1, letter: 'Z' })
        );
        assert!(p.is_locked());
        assert!(p.events().events().is_empty());

        let (d, mut p) = setup();
        assert_eq!(
            d.execute_line(&mut p, "N2 G2 G18 X100 Y200 D50"),
            Err(CommandError::BadValue { id: 2, letter: 'X' })
        );

        let (d, mut p) = setup();
        assert_eq!(
            d.execute_line(&mut p, "N3 G2 G18 Y200 Z100 D50"),
            Ok(Reply::Planned(3))
        );
    }

    #[test]
    fn tool_commands() {
        let (d, mut p) = setup();
        d.execute_line(&mut p, "N1 M3 T2").unwrap();
        assert_eq!(p.hal().tool(2), Some(true));
        d.execute_line(&mut p, "N2 M5 T2").unwrap();
        assert_eq!(p.hal().tool(2), Some(false));
        let err = d.execute_line(&mut p, "N3 M3 T300").unwrap_err();
        assert_eq!(err, CommandError::BadValue { id: 3, letter: 'T' });
    }

    #[test]
    fn locked_reply_does_not_relock() {
        let (d, mut p) = setup();
        d.execute_line(&mut p, "N1 M801").unwrap();
        let halts = p.hal().halts();
        let err = d.execute_line(&mut p, "N2 G1 X100").unwrap_err();
        assert_eq!(err.to_string(), "system is locked");
        assert!(!err.locks());
        assert_eq!(p.hal().halts(), halts);
        assert_eq!(d.execute_line(&mut p, "N3 M800"), Ok(Reply::Ok(3)));
        assert!(!p.is_locked());
    }

    #[test]
    fn full_queue_locks() {
        let (d, mut p) = setup();
        for id in 1..=3 {
            d.execute_line(&mut p, &format!("N{id} G1 X500")).unwrap();
        }
        let err = d.execute_line(&mut p, "N4 G1 X500").unwrap_err();
        assert_eq!(err.to_string(), "no space in buffer");
        assert!(err.locks());
        assert!(p.is_locked());
    }

    #[test]
    fn policies() {
        let (d, mut p) = setup();
        d.execute_line(&mut p, "N1 M802").unwrap();
        assert!(!p.fail_on_endstops());
        d.execute_line(&mut p, "N2 M803").unwrap();
        assert!(p.fail_on_endstops());
        d.execute_line(&mut p, "N3 M996").unwrap();
        assert!(p.break_on_probe());
        d.execute_line(&mut p, "N4 M995").unwrap();
        assert!(!p.break_on_probe());
    }

    #[test]
    fn reports() {
        let (d, mut p) = setup();
        d.execute_line(&mut p, "N1 G1 X100 Z-100").unwrap();
        drain(&mut p);
        let reply = d.execute_line(&mut p, "N2 M114").unwrap();
        assert_eq!(reply, Reply::Position(2, [1, 0, -1]));
        assert_eq!(reply.to_string(), "ok N2 X:1 Y:0 Z:-1");

        p.hal_mut().set_endstop(Axis::Z, true);
        let reply = d.execute_line(&mut p, "N3 M119").unwrap();
        assert_eq!(reply.to_string(), "ok N3 EX:0 EY:0 EZ:1 EP:0");
    }

    #[test]
    fn zero_position_only_when_idle() {
        let (d, mut p) = setup();
        d.execute_line(&mut p, "N1 G1 X300").unwrap();
        assert_eq!(
            d.execute_line(&mut p, "N2 M997"),
            Err(CommandError::Busy { id: 2 })
        );
        assert!(!p.is_locked());
        drain(&mut p);
        assert_eq!(d.execute_line(&mut p, "N3 M997"), Ok(Reply::Ok(3)));
        assert_eq!(p.position().pos, [0; AXES]);
    }
}
