//! Short problem names derived from payload fields.
//!
//! Rules are tried in order; the first one that produces a name wins:
//! 1. USACO problems use their shared input/output file stem
//! 2. CodeChef problems use the last URL segment
//! 3. Titles like `A. Watermelon` or `Problem B2` use the letter code
//!
//! When nothing matches, [`NameResolutionFailed`] is returned and the
//! caller decides what to do.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::NameResolutionFailed;
use crate::schema::Problem;
use crate::util;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:Problem )?([A-Z][0-9]*)\b").expect("valid name pattern"));

const CODECHEF_PREFIX: &str = "https://www.codechef.com";

pub fn name_for(problem: &Problem) -> Result<String, NameResolutionFailed> {
    if let Some(name) = usaco_name(problem) {
        return Ok(name.to_string());
    }

    if let Some(name) = problem
        .url
        .as_deref()
        .filter(|url| url.starts_with(CODECHEF_PREFIX))
        .and_then(util::last_url_segment)
    {
        return Ok(name.to_string());
    }

    if let Some(caps) = NAME_PATTERN.captures(&problem.name) {
        return Ok(caps[1].to_string());
    }

    Err(NameResolutionFailed {
        title: problem.name.clone(),
    })
}

fn usaco_name(problem: &Problem) -> Option<&str> {
    if !problem.group.contains("USACO") {
        return None;
    }
    let input = problem.input.file_name.as_deref()?;
    let output = problem.output.file_name.as_deref()?;

    let input = input.strip_suffix(".in").unwrap_or(input);
    let output = output.strip_suffix(".out").unwrap_or(output);
    (input == output && !input.is_empty()).then_some(input)
}
