//! Interactive questions on stdin: the download date range and the y/n
//! switches of the `run` command.

use crate::models::DateRange;
use anyhow::{Result, bail};
use chrono::NaiveDate;
use std::io::{BufRead, Write};

/// "2019 1 31" → 2019-01-31. Separated by whitespace, like the prompt asks.
pub fn parse_ymd(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    let [y, m, d] = parts.as_slice() else {
        return None;
    };
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// Only an explicit "y" counts as yes.
pub fn parse_yes(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("y")
}

fn read_answer<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<String> {
    write!(output, "{}", question)?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("stdin closed while waiting for an answer");
    }
    Ok(line.trim().to_string())
}

pub fn ask_yes_no<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<bool> {
    Ok(parse_yes(&read_answer(input, output, question)?))
}

fn ask_date<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<NaiveDate> {
    loop {
        let answer = read_answer(input, output, question)?;
        match parse_ymd(&answer) {
            Some(date) => return Ok(date),
            None => writeln!(output, "  '{}' is not a date, expected yyyy mm dd", answer)?,
        }
    }
}

/// Ask for a start date, then either "up to today" or an explicit end date.
pub fn prompt_date_range<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<DateRange> {
    writeln!(output, "\n******* Historical start date of stock data *******\n")?;
    let start = ask_date(input, output, "Enter start date (yyyy mm dd): ")?;

    writeln!(output, "\n******* End date of stock data *******\n")?;
    let range = if ask_yes_no(input, output, "Collect data up to today? (y/n): ")? {
        DateRange::until_today(start)
    } else {
        DateRange::new(start, ask_date(input, output, "Enter end date (yyyy mm dd): ")?)
    };
    Ok(range)
}
