//! ffmpeg `time=` timecode parsing.
use nom::{
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{map_res, opt, recognize},
    sequence::{preceded, tuple},
    IResult,
};

const TIME_TAG: &str = "time=";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid timecode `{0}`, expected H:MM:SS[.fraction]")]
pub struct TimecodeError(pub String);

/// Parse `H+:MM:SS` or `H+:MM:SS.fraction` into seconds.
///
/// The fraction is read as `0.<digits>` whatever its length, so `.45` is 0.45
/// and `.456` is 0.456.
pub fn parse_timecode(input: &str) -> Result<f64, TimecodeError> {
    match timecode(input) {
        Ok(("", secs)) => Ok(secs),
        _ => Err(TimecodeError(input.to_owned())),
    }
}

/// Returns the elapsed seconds of the first valid `time=` token in `line`.
///
/// Most ffmpeg diagnostic lines carry no such token, and `time=N/A` is
/// printed before the first frame is muxed. Both yield `None`.
pub fn progress_time(line: &str) -> Option<f64> {
    line.match_indices(TIME_TAG).find_map(|(idx, _)| {
        let (_, token) = time_token(&line[idx..]).ok()?;
        parse_timecode(token).ok()
    })
}

/// The timecode text following `time=`.
fn time_token(input: &str) -> IResult<&str, &str> {
    preceded(tag(TIME_TAG), recognize(timecode))(input)
}

fn timecode(input: &str) -> IResult<&str, f64> {
    let (rest, (hours, _, minutes, _, seconds, fraction)) = tuple((
        number,
        char(':'),
        number,
        char(':'),
        number,
        opt(preceded(char('.'), digit1)),
    ))(input)?;

    let fraction = match fraction {
        Some(digits) => format!("0.{digits}").parse().unwrap_or(0.0),
        None => 0.0,
    };
    Ok((rest, hours * 3600.0 + minutes * 60.0 + seconds + fraction))
}

fn number(input: &str) -> IResult<&str, f64> {
    map_res(digit1, |digits: &str| digits.parse::<u64>().map(|n| n as f64))(input)
}
