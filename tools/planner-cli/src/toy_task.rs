//!
//! A hand-rolled loader for a toy, line-oriented SAS+ task format. The real
//! grounded-input loader is explicitly out of scope for the core library
//! (spec.md §1); this lives in the tool crate only, purely to give the CLI
//! something to point at.
//!
//! ```text
//! # comments start with '#'
//! variables 2 2
//! initial 0 0
//! goal 0 1 1 1
//! operator flip0 cost 1 pre 0 0 eff 0 1
//! operator flip1 cost 1 pre 1 0 eff 1 1
//! ```

use std::fs;
use std::path::Path;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use planner_task::RawEffect;
use planner_task::RawOperator;
use planner_task::RawTask;

pub fn load(path: &Path) -> Result<RawTask> {
    let text = fs::read_to_string(path).with_context(|| format!("reading task file {}", path.display()))?;
    parse(&text)
}

fn parse(text: &str) -> Result<RawTask> {
    let mut task = RawTask::default();
    let mut have_variables = false;

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens[0] {
            "variables" => {
                task.domains = tokens[1..].iter().map(|t| parse_usize(t, line_no)).collect::<Result<_>>()?;
                have_variables = true;
            }
            "initial" => {
                task.initial_state = tokens[1..].iter().map(|t| parse_usize(t, line_no)).collect::<Result<_>>()?;
            }
            "goal" => {
                task.goals = parse_pairs(&tokens[1..], line_no)?;
            }
            "operator" => {
                task.operators.push(parse_operator(&tokens[1..], line_no)?);
            }
            other => bail!("line {}: unrecognized keyword '{other}'", line_no + 1),
        }
    }

    if !have_variables {
        bail!("task file never declared a 'variables' line");
    }
    Ok(task)
}

fn parse_operator(tokens: &[&str], line_no: usize) -> Result<RawOperator> {
    if tokens.len() < 2 || tokens[1] != "cost" {
        bail!("line {}: operator must read '<name> cost <c> pre ... eff ...'", line_no + 1);
    }
    let name = tokens[0].to_string();
    let cost = parse_usize(tokens[2], line_no)? as u32;

    if tokens.get(3) != Some(&"pre") {
        bail!("line {}: expected 'pre' after the operator cost", line_no + 1);
    }
    let eff_pos = tokens.iter().position(|&t| t == "eff").with_context(|| format!("line {}: operator has no 'eff' section", line_no + 1))?;

    let preconditions = parse_pairs(&tokens[4..eff_pos], line_no)?;
    let effects = parse_pairs(&tokens[eff_pos + 1..], line_no)?
        .into_iter()
        .map(|(var, value)| RawEffect { conditions: Vec::new(), var, value })
        .collect();

    Ok(RawOperator { name, preconditions, effects, cost })
}

fn parse_pairs(tokens: &[&str], line_no: usize) -> Result<Vec<(usize, usize)>> {
    if tokens.len() % 2 != 0 {
        bail!("line {}: expected an even number of '<var> <value>' tokens", line_no + 1);
    }
    tokens
        .chunks_exact(2)
        .map(|pair| Ok((parse_usize(pair[0], line_no)?, parse_usize(pair[1], line_no)?)))
        .collect()
}

fn parse_usize(token: &str, line_no: usize) -> Result<usize> {
    token.parse::<usize>().with_context(|| format!("line {}: '{token}' is not a non-negative integer", line_no + 1))
}
