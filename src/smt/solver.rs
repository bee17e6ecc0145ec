// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use easy_smt as smt;

/// How to launch an incremental SMT-LIB solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmtSolverCmd {
    pub name: &'static str,
    pub args: &'static [&'static str],
    pub logic: &'static str,
    /// option used to reseed the solver before a check
    pub seed_option: Option<&'static str>,
    /// option that limits the time of a single check in milliseconds
    pub timeout_option: Option<&'static str>,
    /// additional `(set-option ...)` commands issued at startup
    pub options: &'static [(&'static str, &'static str)],
}

pub const Z3_CMD: SmtSolverCmd = SmtSolverCmd {
    name: "z3",
    args: &["-smt2", "-in"],
    logic: "ALL",
    seed_option: Some(":smt.random_seed"),
    timeout_option: Some(":timeout"),
    options: &[
        (":produce-models", "true"),
        (":smt.arith.random_initial_value", "true"),
    ],
};

/// Starts the solver process and issues all startup commands. If `replay` is set, the
/// communication is logged into a `replay.smt` file.
pub fn start_solver(
    cmd: &SmtSolverCmd,
    timeout_ms: Option<u64>,
    replay: bool,
) -> std::io::Result<smt::Context> {
    let replay_file = if replay {
        Some(std::fs::File::create("replay.smt")?)
    } else {
        None
    };
    let mut smt_ctx = smt::ContextBuilder::new()
        .solver(cmd.name, cmd.args)
        .replay_file(replay_file)
        .build()?;
    for (name, value) in cmd.options {
        let value = smt_ctx.atom(*value);
        smt_ctx.set_option(*name, value)?;
    }
    if let (Some(option), Some(ms)) = (cmd.timeout_option, timeout_ms) {
        let value = smt_ctx.atom(ms.to_string());
        smt_ctx.set_option(option, value)?;
    }
    smt_ctx.set_logic(cmd.logic)?;
    Ok(smt_ctx)
}
