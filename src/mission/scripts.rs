// Built-in challenge missions
//
// Distances in cm, velocities in deg/s. Turns are phased turns with a 90
// pivot; the degree values (88, 89, 90) are field calibrations.

use super::{MissionScript, ScriptBuilder, SnapshotPredicate};
use crate::hub::Color;
use crate::line_follower::StopCondition;
use crate::motion::{Side, TankPower};
use crate::sensing::WaitCondition;

/// Challenge numbers with a built-in script
pub const CHALLENGES: [u8; 6] = [1, 2, 3, 5, 6, 7];

pub fn challenge(number: u8) -> Option<MissionScript> {
    match number {
        1 => Some(challenge_1()),
        2 => Some(challenge_2()),
        3 => Some(challenge_3()),
        5 => Some(challenge_5()),
        6 => Some(challenge_6()),
        7 => Some(challenge_7()),
        _ => None,
    }
}

/// Dead-reckoning tour with two drop-offs
pub fn challenge_1() -> MissionScript {
    ScriptBuilder::new()
        // Leave the base
        .forward_cm(195.0, 600)
        .turn_right(90, 300)
        .forward_cm(80.0, 600)
        .backward_cm(80.0, 600)
        .turn_right(88, 300)
        .forward_cm(122.0, 600)
        // Center of the field
        .turn_right(88, 300)
        .forward_cm(89.0, 600)
        .turn_left(88, 300)
        .forward_cm(20.0, 600)
        .backward_cm(20.0, 600)
        // Long stretch to the far end
        .turn_left(89, 300)
        .forward_cm(89.0, 600)
        .turn_right(88, 300)
        .forward_cm(270.0, 900)
        .turn_right(88, 300)
        .forward_cm(85.0, 600)
        .backward_cm(85.0, 600)
        .turn_right(90, 300)
        .forward_cm(197.0, 1000)
        .turn_right(90, 300)
        .forward_cm(40.0, 600)
        // Red drop-off
        .turn_right(88, 300)
        .forward_cm(197.0, 600)
        .turn_left(90, 300)
        .forward_cm(7.0, 300)
        .backward_cm(7.0, 300)
        // Blue zone
        .turn_right(90, 300)
        .backward_cm(197.0, 600)
        .turn_right(90, 300)
        .forward_cm(80.0, 600)
        .turn_left(90, 300)
        .forward_cm(23.0, 600)
        .backward_cm(23.0, 600)
        .turn_left(90, 300)
        .forward_cm(40.0, 600)
        // Home
        .turn_left(90, 300)
        .forward_cm(195.0, 1000)
        .turn_left(90, 300)
        .forward_cm(80.0, 1000)
        .stop()
        .build("challenge-1")
}

pub fn challenge_2() -> MissionScript {
    ScriptBuilder::new()
        .forward_cm(118.0, 900)
        .turn_right(90, 300)
        .forward_cm(120.0, 900)
        .turn_right(88, 300)
        .forward_cm(105.0, 900)
        .turn_left(90, 300)
        .forward_cm(65.0, 900)
        .turn_left(90, 300)
        // Out and back on the same path
        .forward_cm(115.0, 900)
        .backward_cm(115.0, 900)
        .turn_right(90, 300)
        .forward_cm(60.0, 900)
        .turn_left(90, 300)
        .forward_cm(95.0, 900)
        .turn_right(90, 300)
        .forward_cm(110.0, 900)
        .turn_right(90, 300)
        .forward_cm(90.0, 900)
        .turn_left(90, 300)
        // Parking
        .forward_cm(25.0, 900)
        .turn_right(90, 300)
        .forward_cm(25.0, 900)
        .stop()
        .build("challenge-2")
}

/// Zig-zag line follow for 450 cycles, then dead reckoning
pub fn challenge_3() -> MissionScript {
    ScriptBuilder::new()
        .follow_line(
            Color::Black,
            TankPower::new(400, 300),
            TankPower::new(300, 400),
            StopCondition::Cycles(450),
        )
        .forward_cm(40.0, 1000)
        .backward_cm(67.0, 1000)
        .turn_left(90, 300)
        .forward_cm(145.0, 800)
        .turn_right(90, 300)
        .forward_cm(70.0, 1000)
        .stop()
        .build("challenge-3")
}

/// Ultrasonic approach and a yellow-gated turn
pub fn challenge_5() -> MissionScript {
    ScriptBuilder::new()
        .forward_cm(172.0, 1000)
        .turn_right(90, 300)
        .forward_cm(55.0, 1000)
        // Sync on the black line, then creep across it
        .wait_color(Color::Black)
        .drive(300)
        .wait_color(Color::White)
        .wait(WaitCondition::UntilDistanceBelow(350))
        .stop()
        .turn_left(90, 300)
        .forward_cm(70.0, 1000)
        .branch(
            SnapshotPredicate::ColorIs(Color::Yellow),
            ScriptBuilder::new().pause_ms(500).turn_left(90, 300),
            ScriptBuilder::new(),
        )
        // Cross the safety line whichever way the branch went
        .wait_color(Color::Black)
        .drive(300)
        .wait_color(Color::White)
        .pause_ms(200)
        .stop()
        .forward_cm(50.0, 1000)
        .turn_left(90, 300)
        .forward_cm(15.0, 1000)
        .stop()
        .build("challenge-5")
}

/// One leg of the port circuit: follow the line for an encoder budget,
/// then creep on until the dock color shows up
fn port_leg(builder: ScriptBuilder, budget: i32, power: TankPower, dock: Color) -> ScriptBuilder {
    builder
        .follow_line(
            Color::Black,
            power,
            power.mirrored(),
            StopCondition::UntilEncoderAbs {
                motor: Side::Right,
                degrees: budget,
            },
        )
        .drive_until(900, WaitCondition::UntilColor(dock))
}

fn u_turn(builder: ScriptBuilder, cm: f64) -> ScriptBuilder {
    builder
        .turn_left(90, 300)
        .forward_cm(cm, 900)
        .turn_left(90, 300)
}

/// Port circuit: line-following legs between colored docks
pub fn challenge_6() -> MissionScript {
    let fast = TankPower::new(1000, 900);
    let cruise = TankPower::new(900, 800);

    let mut b = ScriptBuilder::new()
        .forward_cm(63.0, 1000)
        .turn_right(90, 300);
    b = port_leg(b, 3450, fast, Color::Green);
    b = u_turn(b, 5.0);
    b = port_leg(b, 1200, cruise, Color::Yellow);
    b = u_turn(b, 5.0);
    b = port_leg(b, 1600, cruise, Color::Red);
    b = u_turn(b, 15.0);
    b = port_leg(b, 3800, cruise, Color::Blue);

    // Blue port maneuver
    b = b
        .turn_right(90, 300)
        .forward_cm(35.0, 900)
        .turn_right(90, 300)
        .forward_cm(25.0, 900)
        .turn_right(90, 300)
        .forward_cm(20.0, 900)
        .backward_cm(20.0, 900)
        .turn_right(90, 300)
        .forward_cm(25.0, 900)
        .turn_left(90, 300)
        .forward_cm(30.0, 900)
        .turn_right(90, 300);

    b = port_leg(b, 4100, cruise, Color::White);
    b = u_turn(b, 5.0);
    b = port_leg(b, 1700, cruise, Color::Black);
    b = u_turn(b, 5.0);
    b = port_leg(b, 1600, cruise, Color::Blue);
    b = u_turn(b, 5.0);

    // Gray dock has no distinct reading; creep briefly instead
    b = b
        .follow_line(
            Color::Black,
            cruise,
            cruise.mirrored(),
            StopCondition::UntilEncoderAbs {
                motor: Side::Right,
                degrees: 1500,
            },
        )
        .drive(900)
        .pause_ms(200)
        .stop()
        .turn_right(90, 300);

    b = port_leg(b, 1200, cruise, Color::White);
    b = u_turn(b, 5.0);

    b.follow_line(
        Color::Black,
        cruise,
        cruise.mirrored(),
        StopCondition::UntilEncoderAbs {
            motor: Side::Right,
            degrees: 1700,
        },
    )
    .turn_left(90, 300)
    .forward_cm(90.0, 900)
    .stop()
    .build("challenge-6")
}

/// Wait for the black-then-white crossing at the given speed, then stop
fn cross_line(builder: ScriptBuilder, velocity: i32) -> ScriptBuilder {
    builder
        .wait_color(Color::Black)
        .drive(velocity)
        .wait_color(Color::White)
        .stop()
}

/// Line crossings, ultrasonic stop and two color-gated retreats
pub fn challenge_7() -> MissionScript {
    let mut b = ScriptBuilder::new()
        .wait_color(Color::White)
        .drive(1000)
        .wait_color(Color::Black)
        .wait_color(Color::White)
        .stop()
        .pause_ms(500)
        .turn_left(90, 300)
        .forward_cm(70.0, 1000)
        .turn_right(90, 300)
        .forward_cm(45.0, 1000)
        .pause_ms(500)
        .turn_right(90, 300)
        .forward_cm(72.0, 1000)
        .turn_right(90, 300)
        .forward_cm(50.0, 1000);
    b = cross_line(b, 1000);

    b = b
        .forward_cm(8.8, 300)
        .turn_right(90, 300)
        .forward_cm(5.0, 300)
        .wait_color(Color::Black)
        .drive_until(1000, WaitCondition::UntilDistanceBelow(500))
        // Slow approach so the color can be read
        .turn_left(90, 300)
        .forward_cm(27.0, 300)
        .branch(
            SnapshotPredicate::ColorIs(Color::Red),
            ScriptBuilder::new().backward_cm(135.0, 1000),
            ScriptBuilder::new(),
        )
        .turn_right(90, 300)
        .forward_cm(45.0, 1000)
        .pause_ms(500)
        .backward_cm(45.0, 1000)
        .turn_left(90, 300)
        .forward_cm(108.0, 1000)
        .turn_left(90, 300)
        .forward_cm(20.0, 1000)
        .turn_right(90, 300)
        .forward_cm(21.0, 1000)
        .branch(
            SnapshotPredicate::ColorIs(Color::Green),
            ScriptBuilder::new().backward_cm(21.0, 1000),
            ScriptBuilder::new(),
        )
        .turn_left(90, 300);
    b = cross_line(b, 1000);

    b = b
        .forward_cm(8.0, 1000)
        .turn_left(90, 300)
        .forward_cm(5.0, 1000);
    cross_line(b, 1000).build("challenge-7")
}
