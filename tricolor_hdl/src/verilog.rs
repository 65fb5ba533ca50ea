//! Verilog emission.
//!
//! The same text feeds Yosys for synthesis and SymbiYosys for formal runs.
//! Cover statements live in a `` `ifdef FORMAL `` block, so synthesis never
//! sees them.

use itertools::Itertools;

use crate::ir::{Design, Expr, PortDirection, Signal, SignalKind};
use crate::property::{CoverProperty, PropExpr};

/// Name of the register that masks `$past` on the first cycle.
pub const PAST_VALID: &str = "past_valid";

fn range(width: u32) -> String {
    if width > 1 {
        format!("[{}:0] ", width - 1)
    } else {
        String::new()
    }
}

fn literal(value: u64, width: u32) -> String {
    format!("{width}'d{value}")
}

/// Render an IR expression, fully parenthesised.
pub fn expr(e: &Expr) -> String {
    match e {
        Expr::Const { value, width } => literal(*value, *width),
        Expr::Signal(name) => name.clone(),
        Expr::Add(a, b) => format!("({} + {})", expr(a), expr(b)),
        Expr::Sub(a, b) => format!("({} - {})", expr(a), expr(b)),
        Expr::Eq(a, b) => format!("({} == {})", expr(a), expr(b)),
        Expr::And(a, b) => format!("({} && {})", expr(a), expr(b)),
        Expr::Not(a) => format!("(!{})", expr(a)),
        Expr::Mux {
            sel,
            then,
            otherwise,
        } => format!("({} ? {} : {})", expr(sel), expr(then), expr(otherwise)),
    }
}

/// Render a property predicate; history becomes `$past`.
pub fn prop_expr(e: &PropExpr) -> String {
    match e {
        PropExpr::Signal(name) => name.clone(),
        PropExpr::Past(name) => format!("$past({name})"),
        PropExpr::Const { value, width } => literal(*value, *width),
        PropExpr::Eq(a, b) => format!("({} == {})", prop_expr(a), prop_expr(b)),
        PropExpr::And(a, b) => format!("({} && {})", prop_expr(a), prop_expr(b)),
        PropExpr::Not(a) => format!("(!{})", prop_expr(a)),
    }
}

fn port_decl(signal: &Signal, direction: PortDirection) -> String {
    let kind = match (direction, signal.kind) {
        (PortDirection::Input, _) => "input wire",
        (PortDirection::Output, SignalKind::Register { .. }) => "output reg",
        (PortDirection::Output, _) => "output wire",
    };
    format!("{kind} {}{}", range(signal.width), signal.name)
}

fn cover_stmt(cover: &CoverProperty) -> String {
    format!("{}: cover ({});", cover.name(), prop_expr(cover.predicate()))
}

/// Emit a self-contained Verilog module for `design`.
pub fn emit(design: &Design) -> String {
    let mut out = Vec::new();
    out.push(format!("// Generated by tricolor from design '{}'.", design.name()));
    out.push("`default_nettype none".to_string());

    let ports = design
        .ports()
        .iter()
        .filter_map(|p| design.signal(&p.signal).map(|s| port_decl(s, p.direction)))
        .map(|decl| format!("    {decl}"))
        .join(",\n");
    out.push(format!("module {} (\n{}\n);", design.name(), ports));

    let internal: Vec<&Signal> = design
        .signals()
        .filter(|s| design.port(&s.name).is_none())
        .collect();
    for signal in &internal {
        let kind = if signal.is_register() { "reg" } else { "wire" };
        out.push(format!("    {kind} {}{};", range(signal.width), signal.name));
    }

    let resets = design
        .signals()
        .filter_map(|s| match s.kind {
            SignalKind::Register { reset } => Some(format!(
                "        {} = {};",
                s.name,
                literal(reset & s.mask(), s.width)
            )),
            SignalKind::Input | SignalKind::Wire => None,
        })
        .collect::<Vec<_>>();
    if !resets.is_empty() {
        out.push(String::new());
        out.push("    initial begin".to_string());
        out.extend(resets);
        out.push("    end".to_string());
    }

    if !design.comb().is_empty() {
        out.push(String::new());
        for assign in design.comb() {
            out.push(format!("    assign {} = {};", assign.target, expr(&assign.expr)));
        }
    }

    if !design.sync().is_empty() {
        out.push(String::new());
        out.push(format!("    always @(posedge {}) begin", design.clock()));
        for assign in design.sync() {
            out.push(format!("        {} <= {};", assign.target, expr(&assign.expr)));
        }
        out.push("    end".to_string());
    }

    if !design.covers().is_empty() {
        let clock = design.clock();
        out.push(String::new());
        out.push("`ifdef FORMAL".to_string());
        out.push(format!("    reg {PAST_VALID} = 1'b0;"));
        out.push(format!("    always @(posedge {clock}) {PAST_VALID} <= 1'b1;"));
        out.push(String::new());
        out.push(format!("    always @(posedge {clock}) begin"));
        for cover in design.covers() {
            if cover.predicate().uses_past() {
                out.push(format!("        if ({PAST_VALID}) {}", cover_stmt(cover)));
            } else {
                out.push(format!("        {}", cover_stmt(cover)));
            }
        }
        out.push("    end".to_string());
        out.push("`endif".to_string());
    }

    out.push("endmodule".to_string());
    out.push(String::new());
    out.join("\n")
}
