use crate::commands::{DetectorCommand, SocketRequest};
use crate::debounce::Level;
use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{digit1, space1},
    combinator::{map, map_res, opt},
    sequence::{preceded, separated_pair},
    Finish, IResult,
};
use std::str::FromStr;

fn parse_int<T: FromStr>(input: &str) -> IResult<&str, T> {
    map_res(digit1, |x| T::from_str(x))(input)
}

fn pulse_cmd(input: &str) -> IResult<&str, SocketRequest> {
    let p = preceded(tag_no_case("pulse"), opt(preceded(space1, parse_int)));
    map(p, |n: Option<u32>| SocketRequest::Pulse(n.unwrap_or(1)))(input)
}

fn reset_cmd(input: &str) -> IResult<&str, SocketRequest> {
    let p = tag_no_case("reset");
    map(p, |_| SocketRequest::Command(DetectorCommand::Reset))(input)
}

fn status_cmd(input: &str) -> IResult<&str, SocketRequest> {
    let p = tag_no_case("status");
    map(p, |_| SocketRequest::Status)(input)
}

fn level(input: &str) -> IResult<&str, Level> {
    alt((
        map(tag_no_case("down"), |_| Level::Low),
        map(tag_no_case("up"), |_| Level::High),
    ))(input)
}

fn button_cmd(input: &str) -> IResult<&str, SocketRequest> {
    let p = separated_pair(tag_no_case("button"), space1, level);
    map(p, |(_, lvl)| {
        SocketRequest::Command(DetectorCommand::Button(lvl))
    })(input)
}

impl FromStr for SocketRequest {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cmds = alt((pulse_cmd, reset_cmd, status_cmd, button_cmd));
        if let Ok((_, cmd)) = cmds(s.trim_start()).finish() {
            Ok(cmd)
        } else {
            Err(())
        }
    }
}

#[cfg(test)]
mod checks {
    use super::*;
    #[test]
    fn check_pulse() {
        assert_eq!("pulse\n".parse(), Ok(SocketRequest::Pulse(1)));
        assert_eq!("PULSE 12\n".parse(), Ok(SocketRequest::Pulse(12)));
    }
    #[test]
    fn check_reset() {
        let cmd = SocketRequest::Command(DetectorCommand::Reset);
        assert_eq!("Reset\n".parse(), Ok(cmd));
    }
    #[test]
    fn check_status() {
        assert_eq!("status".parse(), Ok(SocketRequest::Status));
    }
    #[test]
    fn check_button() {
        let down = SocketRequest::Command(DetectorCommand::Button(Level::Low));
        let up = SocketRequest::Command(DetectorCommand::Button(Level::High));
        assert_eq!("button down\n".parse(), Ok(down));
        assert_eq!("BUTTON Up".parse(), Ok(up));
        assert_eq!("button sideways".parse::<SocketRequest>(), Err(()));
    }
    #[test]
    fn check_uint_parse() {
        assert_eq!(parse_int::<u32>("1234\n"), Ok(("\n", 1234)));
        assert!(parse_int::<u32>("99999999999").is_err());
    }
    #[test]
    fn check_garbage() {
        assert_eq!("".parse::<SocketRequest>(), Err(()));
        assert_eq!("add www.example.com".parse::<SocketRequest>(), Err(()));
    }
}
