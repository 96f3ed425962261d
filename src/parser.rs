//! SPICE netlist parser.
//!
//! Parses a subset of SPICE into a [`Netlist`].
//!
//! # Supported syntax
//!
//! ```text
//! Title line (always the first line)
//! * comment line
//! + continuation of the previous line
//! Rname n+ n- value
//! Cname n+ n- value [IC=v]
//! Lname n+ n- value [IC=i]
//! Ename n+ n- nc+ nc- gain      (VCVS)
//! Gname n+ n- nc+ nc- gain      (VCCS)
//! Fname n+ n- vctrl gain        (CCCS)
//! Hname n+ n- vctrl gain        (CCVS)
//! Vname n+ n- [[DC] v] [AC mag [phase]] [SIN(...)|PULSE(...)]
//! Iname n+ n- [[DC] v] [AC mag [phase]] [SIN(...)|PULSE(...)]
//! Dname n+ n- model [IC=v]
//! .MODEL name D([IS=v] [N=v] [TEMP=v])
//! .OP
//! .DC Vsrc|Isrc start stop incr
//! .AC DEC|OCT|LIN np fstart fstop
//! .TRAN tstep tstop [tstart]
//! .PRINT|.PLOT DC|AC|TRAN|OP V(n) VDB(n1,n2) I(Vsrc) ...
//! .END
//! ```
//!
//! Values support engineering suffixes: T, G, MEG, K, M, U, N, P, F
//! (case-insensitive); trailing unit letters are ignored. Element, model
//! and source names are case-insensitive and stored upper-cased.

use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while, take_while1};
use nom::character::complete::{char, space0, space1};
use nom::combinator::{map, opt};
use nom::multi::{many0, many1};
use nom::number::complete::double;
use nom::sequence::{delimited, preceded};
use nom::IResult;
use nom::Parser;
use tracing::warn;

use crate::error::{Result, VoltaicError};
use crate::ir::{
    AcSweepType, Analysis, AnalysisKind, Component, Netlist, OutputKind, OutputRequest, Quantity,
    SweepSourceKind, Transform, TransientFunc, Variable,
};
use crate::model::{DiodeModel, DEFAULT_TEMPERATURE};

/// Saturation current used when a `.MODEL` card omits `IS`.
const DEFAULT_IS: f64 = 1e-14;

type LineResult<T> = std::result::Result<T, String>;

/// Parse a SPICE netlist string.
pub fn parse(input: &str) -> Result<Netlist> {
    let mut netlist = Netlist::default();

    for (line_num, line) in logical_lines(input) {
        if line_num == 1 {
            netlist.title = line.trim().to_string();
            continue;
        }
        let line = line.trim();
        if line.is_empty() || line.starts_with('*') {
            continue;
        }
        if line.eq_ignore_ascii_case(".END") {
            break;
        }

        let first = line.chars().next().map(|c| c.to_ascii_uppercase());
        let parsed = match first {
            Some('R' | 'C' | 'L') => parse_rlc_line(line).map(|c| netlist.add_component(c)),
            Some('E' | 'G') => parse_vc_line(line).map(|c| netlist.add_component(c)),
            Some('F' | 'H') => parse_cc_line(line).map(|c| netlist.add_component(c)),
            Some('V' | 'I') => parse_source_line(line).map(|c| netlist.add_component(c)),
            Some('D') => parse_diode_line(line).map(|c| netlist.add_component(c)),
            Some('.') => parse_dot_command(line, &mut netlist),
            Some(other) => Err(format!("unknown element '{other}'")),
            None => Ok(()),
        };
        parsed.map_err(|e| parse_err(line_num, &line, &e))?;
    }

    Ok(netlist)
}

fn parse_err(line_num: usize, line: &str, detail: &str) -> VoltaicError {
    VoltaicError::Parse(format!("line {line_num}: {detail} in: {line}"))
}

/// Join `+` continuation lines onto the line they continue. Each logical
/// line carries the 1-based number of its first physical line.
fn logical_lines(input: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        if let (Some(cont), Some((n, prev))) = (raw.trim_start().strip_prefix('+'), lines.last_mut())
        {
            if *n > 1 {
                prev.push(' ');
                prev.push_str(cont);
                continue;
            }
        }
        lines.push((idx + 1, raw.to_string()));
    }
    lines
}

/// Require that a parser consumed everything but trailing whitespace.
fn finish<T>(res: IResult<&str, T>, what: &str) -> LineResult<T> {
    match res {
        Ok((rest, value)) if rest.trim().is_empty() => Ok(value),
        Ok((rest, _)) => Err(format!("unexpected '{}' after {what}", rest.trim())),
        Err(_) => Err(format!("failed to parse {what}")),
    }
}

// ---------------------------------------------------------------------------
// Engineering suffix value parser
// ---------------------------------------------------------------------------

/// Parse a numeric value with optional engineering suffix.
/// Handles: 10k, 100n, 4.7u, 1MEG, 1e3, -3.3, 5V, 10kOhm.
fn eng_value(input: &str) -> IResult<&str, f64> {
    let (rest, num) = double(input)?;
    let (rest, suffix) = opt(eng_suffix).parse(rest)?;
    let (rest, _units) = take_while(|c: char| c.is_ascii_alphabetic())(rest)?;
    Ok((rest, num * suffix.unwrap_or(1.0)))
}

/// Match an engineering suffix and return its multiplier.
fn eng_suffix(input: &str) -> IResult<&str, f64> {
    // MEG before M
    alt((
        map(tag_no_case("MEG"), |_: &str| 1e6),
        map(tag_no_case("T"), |_: &str| 1e12),
        map(tag_no_case("G"), |_: &str| 1e9),
        map(tag_no_case("K"), |_: &str| 1e3),
        map(tag_no_case("M"), |_: &str| 1e-3),
        map(tag_no_case("U"), |_: &str| 1e-6),
        map(tag_no_case("N"), |_: &str| 1e-9),
        map(tag_no_case("P"), |_: &str| 1e-12),
        map(tag_no_case("F"), |_: &str| 1e-15),
    ))
    .parse(input)
}

/// A whitespace-separated value.
fn value_field(input: &str) -> IResult<&str, f64> {
    preceded(space1, eng_value).parse(input)
}

// ---------------------------------------------------------------------------
// Token parsers
// ---------------------------------------------------------------------------

/// Parse a node identifier, e.g. "0", "GND", "out", "n_1".
fn node_id(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

fn node_field(input: &str) -> IResult<&str, String> {
    map(preceded(space1, node_id), str::to_string).parse(input)
}

/// Parse a component/element name (everything up to the first whitespace).
fn element_name(input: &str) -> IResult<&str, String> {
    map(take_while1(|c: char| !c.is_whitespace()), str::to_uppercase).parse(input)
}

/// Name field referring to another element or model.
fn name_field(input: &str) -> IResult<&str, String> {
    preceded(space1, element_name).parse(input)
}

/// `IC=value`, optionally with spaces around `=`.
fn initial_condition(input: &str) -> IResult<&str, f64> {
    preceded(
        (space1, tag_no_case("IC"), space0, char('='), space0),
        eng_value,
    )
    .parse(input)
}

// ---------------------------------------------------------------------------
// Element lines
// ---------------------------------------------------------------------------

/// Rname n+ n- value, Cname n+ n- value [IC=v], Lname n+ n- value [IC=i]
fn parse_rlc_line(line: &str) -> LineResult<Component> {
    let (name, np, nm, value, ic) = finish(
        (
            element_name,
            node_field,
            node_field,
            value_field,
            opt(initial_condition),
        )
            .parse(line),
        "element",
    )?;
    let nodes = (np, nm);

    match name.chars().next() {
        Some('R') if ic.is_none() => Ok(Component::Resistor {
            name,
            nodes,
            resistance: value,
        }),
        Some('R') => Err("resistor takes no initial condition".into()),
        Some('C') => Ok(Component::Capacitor {
            name,
            nodes,
            capacitance: value,
            initial_voltage: ic.unwrap_or(0.0),
        }),
        _ => Ok(Component::Inductor {
            name,
            nodes,
            inductance: value,
            initial_current: ic.unwrap_or(0.0),
        }),
    }
}

/// Ename/Gname n+ n- nc+ nc- gain
fn parse_vc_line(line: &str) -> LineResult<Component> {
    let (name, np, nm, cp, cm, gain) = finish(
        (
            element_name,
            node_field,
            node_field,
            node_field,
            node_field,
            value_field,
        )
            .parse(line),
        "controlled source",
    )?;
    let nodes = (np, nm);
    let control = (cp, cm);
    Ok(if name.starts_with('E') {
        Component::Vcvs {
            name,
            nodes,
            control,
            gain,
        }
    } else {
        Component::Vccs {
            name,
            nodes,
            control,
            gain,
        }
    })
}

/// Fname/Hname n+ n- vctrl gain
fn parse_cc_line(line: &str) -> LineResult<Component> {
    let (name, np, nm, vsource, gain) = finish(
        (element_name, node_field, node_field, name_field, value_field).parse(line),
        "controlled source",
    )?;
    let nodes = (np, nm);
    Ok(if name.starts_with('F') {
        Component::Cccs {
            name,
            nodes,
            vsource,
            gain,
        }
    } else {
        Component::Ccvs {
            name,
            nodes,
            vsource,
            gain,
        }
    })
}

/// Dname anode cathode MODEL [IC=v]
fn parse_diode_line(line: &str) -> LineResult<Component> {
    let (name, np, nm, model, ic) = finish(
        (
            element_name,
            node_field,
            node_field,
            name_field,
            opt(initial_condition),
        )
            .parse(line),
        "diode",
    )?;
    Ok(Component::Diode {
        name,
        nodes: (np, nm),
        model,
        initial_voltage: ic.unwrap_or(0.0),
    })
}

// ---------------------------------------------------------------------------
// V/I source parsing
// ---------------------------------------------------------------------------

/// One clause of a source specification.
#[derive(Debug)]
enum SourceSpec<'a> {
    Dc(f64),
    Ac(f64, f64),
    /// Waveform keyword and its raw parenthesized arguments.
    Func(&'a str, &'a str),
}

fn source_spec(input: &str) -> IResult<&str, SourceSpec<'_>> {
    alt((
        map(preceded((tag_no_case("DC"), space1), eng_value), SourceSpec::Dc),
        map(
            preceded(tag_no_case("AC"), (value_field, opt(value_field))),
            |(mag, phase)| SourceSpec::Ac(mag, phase.unwrap_or(0.0)),
        ),
        map(
            (
                alt((tag_no_case("SIN"), tag_no_case("PULSE"))),
                space0,
                delimited(char('('), take_while(|c: char| c != ')'), char(')')),
            ),
            |(kind, _, args)| SourceSpec::Func(kind, args),
        ),
        map(eng_value, SourceSpec::Dc),
    ))
    .parse(input)
}

/// Vname/Iname n+ n- [[DC] v] [AC mag [phase]] [SIN(...)|PULSE(...)]
fn parse_source_line(line: &str) -> LineResult<Component> {
    let (name, np, nm, specs) = finish(
        (
            element_name,
            node_field,
            node_field,
            many0(preceded(space1, source_spec)),
        )
            .parse(line),
        "source",
    )?;

    let mut dc = 0.0;
    let mut ac = None;
    let mut tran = None;
    for spec in specs {
        match spec {
            SourceSpec::Dc(v) => dc = v,
            SourceSpec::Ac(mag, phase) => ac = Some((mag, phase)),
            SourceSpec::Func(kind, args) => tran = Some(transient_func(kind, args)?),
        }
    }

    let nodes = (np, nm);
    Ok(if name.starts_with('V') {
        Component::VSource {
            name,
            nodes,
            dc,
            ac,
            tran,
        }
    } else {
        Component::ISource {
            name,
            nodes,
            dc,
            ac,
            tran,
        }
    })
}

/// Build a waveform from `SIN`/`PULSE` arguments. Omitted trailing
/// arguments are zero, which the evaluator maps to analysis defaults.
fn transient_func(kind: &str, args: &str) -> LineResult<TransientFunc> {
    let values = args
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| finish(eng_value(t), "waveform argument"))
        .collect::<LineResult<Vec<f64>>>()?;
    let arg = |i: usize| values.get(i).copied().unwrap_or(0.0);

    if kind.eq_ignore_ascii_case("SIN") {
        if !(2..=6).contains(&values.len()) {
            return Err(format!("SIN takes 2 to 6 arguments, got {}", values.len()));
        }
        Ok(TransientFunc::Sin {
            vo: arg(0),
            va: arg(1),
            freq: arg(2),
            td: arg(3),
            theta: arg(4),
            phase: arg(5),
        })
    } else {
        if !(2..=7).contains(&values.len()) {
            return Err(format!("PULSE takes 2 to 7 arguments, got {}", values.len()));
        }
        Ok(TransientFunc::Pulse {
            v1: arg(0),
            v2: arg(1),
            td: arg(2),
            tr: arg(3),
            tf: arg(4),
            pw: arg(5),
            per: arg(6),
        })
    }
}

// ---------------------------------------------------------------------------
// Dot commands
// ---------------------------------------------------------------------------

fn dot_keyword(input: &str) -> IResult<&str, String> {
    map(
        preceded(char('.'), take_while1(|c: char| c.is_ascii_alphabetic())),
        str::to_uppercase,
    )
    .parse(input)
}

/// Parse a dot command into the netlist. Unrecognized commands are logged
/// and ignored.
fn parse_dot_command(line: &str, netlist: &mut Netlist) -> LineResult<()> {
    let (rest, keyword) =
        dot_keyword(line).map_err(|_| "malformed dot command".to_string())?;

    match keyword.as_str() {
        "OP" => {
            finish(space0(rest), ".OP")?;
            netlist.analyses.push(Analysis::Op);
        }
        "DC" => netlist.analyses.push(parse_dc_command(rest)?),
        "AC" => netlist.analyses.push(parse_ac_command(rest)?),
        "TRAN" => netlist.analyses.push(parse_tran_command(rest)?),
        "PRINT" | "PLOT" => {
            let kind = if keyword == "PRINT" {
                OutputKind::Print
            } else {
                OutputKind::Plot
            };
            netlist.outputs.push(parse_output_command(rest, kind)?);
        }
        "MODEL" => netlist.add_model(parse_model_command(rest)?),
        _ => warn!(command = %keyword, "ignoring unsupported dot command"),
    }
    Ok(())
}

/// .DC Vsrc|Isrc start stop incr
fn parse_dc_command(rest: &str) -> LineResult<Analysis> {
    let (source, start, stop, increment) = finish(
        (name_field, value_field, value_field, value_field).parse(rest),
        ".DC",
    )?;
    let source_kind = match source.chars().next() {
        Some('V') => SweepSourceKind::Voltage,
        Some('I') => SweepSourceKind::Current,
        _ => return Err(format!("DC sweep source '{source}' is not a V or I source")),
    };
    Ok(Analysis::Dc {
        source_kind,
        source,
        start,
        stop,
        increment,
    })
}

fn sweep_type(input: &str) -> IResult<&str, AcSweepType> {
    alt((
        map(tag_no_case("DEC"), |_| AcSweepType::Dec),
        map(tag_no_case("OCT"), |_| AcSweepType::Oct),
        map(tag_no_case("LIN"), |_| AcSweepType::Lin),
    ))
    .parse(input)
}

fn count_field(input: &str) -> IResult<&str, &str> {
    preceded(space1, take_while1(|c: char| c.is_ascii_digit())).parse(input)
}

/// .AC DEC|OCT|LIN np fstart fstop
fn parse_ac_command(rest: &str) -> LineResult<Analysis> {
    let (sweep_type, digits, f_start, f_stop) = finish(
        (
            preceded(space1, sweep_type),
            count_field,
            value_field,
            value_field,
        )
            .parse(rest),
        ".AC",
    )?;
    let n_points = digits
        .parse()
        .map_err(|_| format!("invalid point count '{digits}'"))?;
    Ok(Analysis::Ac {
        sweep_type,
        n_points,
        f_start,
        f_stop,
    })
}

/// .TRAN tstep tstop [tstart]
fn parse_tran_command(rest: &str) -> LineResult<Analysis> {
    let (tstep, tstop, tstart) = finish(
        (value_field, value_field, opt(value_field)).parse(rest),
        ".TRAN",
    )?;
    Ok(Analysis::Tran {
        tstep,
        tstop,
        tstart: tstart.unwrap_or(0.0),
    })
}

fn analysis_kind(input: &str) -> IResult<&str, AnalysisKind> {
    alt((
        map(tag_no_case("TRAN"), |_| AnalysisKind::Tran),
        map(tag_no_case("DC"), |_| AnalysisKind::Dc),
        map(tag_no_case("AC"), |_| AnalysisKind::Ac),
        map(tag_no_case("OP"), |_| AnalysisKind::Op),
    ))
    .parse(input)
}

/// `PREFIX(args)` such as `VDB(out)` or `V(a,b)`.
fn raw_variable(input: &str) -> IResult<&str, (&str, &str)> {
    (
        take_while1(|c: char| c.is_ascii_alphabetic()),
        delimited(char('('), take_while1(|c: char| c != ')'), char(')')),
    )
        .parse(input)
}

/// .PRINT|.PLOT DC|AC|TRAN|OP var...
fn parse_output_command(rest: &str, kind: OutputKind) -> LineResult<OutputRequest> {
    let (analysis, raw) = finish(
        (
            preceded(space1, analysis_kind),
            many1(preceded(space1, raw_variable)),
        )
            .parse(rest),
        "output request",
    )?;
    let variables = raw
        .into_iter()
        .map(|(prefix, args)| to_variable(prefix, args))
        .collect::<LineResult<Vec<_>>>()?;
    Ok(OutputRequest {
        kind,
        analysis,
        variables,
    })
}

fn to_variable(prefix: &str, args: &str) -> LineResult<Variable> {
    let upper = prefix.to_uppercase();
    let (quantity, suffix) = match upper.split_at(1) {
        ("V", s) => (Quantity::Voltage, s),
        ("I", s) => (Quantity::Current, s),
        _ => return Err(format!("unknown output variable '{prefix}'")),
    };
    let transform = match suffix {
        "" | "M" => Transform::Mag,
        "R" => Transform::Real,
        "I" => Transform::Imag,
        "P" => Transform::Phase,
        "DB" => Transform::Db,
        _ => return Err(format!("unknown output variable '{prefix}'")),
    };

    let targets: Vec<String> = args.split(',').map(|t| t.trim().to_string()).collect();
    if targets.iter().any(String::is_empty) {
        return Err(format!("empty argument in {prefix}({args})"));
    }
    let targets = match (quantity, targets.len()) {
        (Quantity::Voltage, 1 | 2) => targets,
        (Quantity::Current, 1) => targets.into_iter().map(|t| t.to_uppercase()).collect(),
        _ => return Err(format!("wrong number of arguments in {prefix}({args})")),
    };
    Ok(Variable {
        quantity,
        transform,
        targets,
    })
}

// ---------------------------------------------------------------------------
// .MODEL parsing
// ---------------------------------------------------------------------------

fn model_param(input: &str) -> IResult<&str, (&str, f64)> {
    map(
        (
            take_while(|c: char| c == ',' || c.is_whitespace()),
            take_while1(|c: char| c.is_ascii_alphabetic()),
            space0,
            char('='),
            space0,
            eng_value,
        ),
        |(_, key, _, _, _, value)| (key, value),
    )
    .parse(input)
}

/// .MODEL name D([IS=v] [N=v] [TEMP=v])
fn parse_model_command(rest: &str) -> LineResult<DiodeModel> {
    let (name, _, _, params) = finish(
        (
            name_field,
            space1,
            tag_no_case("D"),
            opt(delimited(
                (space0, char('(')),
                many0(model_param),
                (space0, char(')')),
            )),
        )
            .parse(rest),
        ".MODEL",
    )?;

    let mut is = DEFAULT_IS;
    let mut n = None;
    let mut temperature = DEFAULT_TEMPERATURE;
    for (key, value) in params.unwrap_or_default() {
        match key.to_uppercase().as_str() {
            "IS" => is = value,
            "N" => n = Some(value),
            "TEMP" => temperature = value,
            _ => return Err(format!("unknown model parameter '{key}'")),
        }
    }
    Ok(DiodeModel::new(name, is, n, temperature))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parse_body(body: &str) -> Netlist {
        parse(&format!("test circuit\n{body}")).unwrap()
    }

    // ---- Engineering suffix tests ----

    #[test]
    fn test_eng_value_suffixes() {
        let cases = [
            ("100", 100.0),
            ("4.7", 4.7),
            ("10k", 1e4),
            ("10K", 1e4),
            ("1MEG", 1e6),
            ("2.2meg", 2.2e6),
            ("100m", 0.1),
            ("4.7u", 4.7e-6),
            ("100n", 100e-9),
            ("22p", 22e-12),
            ("10f", 10e-15),
            ("1T", 1e12),
            ("2.5G", 2.5e9),
            ("1e3", 1e3),
            ("-3.3", -3.3),
        ];
        for (text, expected) in cases {
            let (rest, val) = eng_value(text).unwrap();
            assert_eq!(rest, "", "{text}");
            assert_relative_eq!(val, expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_eng_value_ignores_units() {
        let (rest, val) = eng_value("10kOhm").unwrap();
        assert_eq!(rest, "");
        assert_relative_eq!(val, 1e4);
        let (_, val) = eng_value("5V").unwrap();
        assert_relative_eq!(val, 5.0);
    }

    // ---- Elements ----

    #[test]
    fn test_title_and_comments() {
        let n = parse("My circuit\n* a comment\n\nR1 1 0 1k\n.END\nR2 2 0 1k\n").unwrap();
        assert_eq!(n.title, "My circuit");
        assert_eq!(n.components.len(), 1);
    }

    #[test]
    fn test_rlc_with_initial_conditions() {
        let n = parse_body("r1 a b 1k\nC1 a 0 1u IC=2.5\nL1 b 0 10m ic = 1m\n");
        assert_eq!(
            n.components[0],
            Component::Resistor {
                name: "R1".into(),
                nodes: ("a".into(), "b".into()),
                resistance: 1e3
            }
        );
        match &n.components[1] {
            Component::Capacitor {
                capacitance,
                initial_voltage,
                ..
            } => {
                assert_relative_eq!(*capacitance, 1e-6);
                assert_relative_eq!(*initial_voltage, 2.5);
            }
            other => panic!("expected capacitor, got {other:?}"),
        }
        match &n.components[2] {
            Component::Inductor {
                initial_current, ..
            } => assert_relative_eq!(*initial_current, 1e-3),
            other => panic!("expected inductor, got {other:?}"),
        }
    }

    #[test]
    fn test_controlled_sources() {
        let n = parse_body("E1 3 0 1 2 10\nG1 3 0 1 2 1m\nF1 4 0 vsense 2\nH1 5 0 Vsense 100\n");
        assert_eq!(
            n.components[0],
            Component::Vcvs {
                name: "E1".into(),
                nodes: ("3".into(), "0".into()),
                control: ("1".into(), "2".into()),
                gain: 10.0
            }
        );
        assert!(matches!(&n.components[1], Component::Vccs { gain, .. } if *gain == 1e-3));
        assert!(matches!(&n.components[2], Component::Cccs { vsource, .. } if vsource == "VSENSE"));
        assert!(matches!(&n.components[3], Component::Ccvs { vsource, .. } if vsource == "VSENSE"));
    }

    #[test]
    fn test_source_specs() {
        let n = parse_body(
            "V1 1 0 5\nV2 2 0 DC 3 AC 1 45\nV3 3 0 AC 2\nI1 0 4 DC 1m\nV4 5 0\n",
        );
        let src = |i: usize| match &n.components[i] {
            Component::VSource { dc, ac, .. } | Component::ISource { dc, ac, .. } => (*dc, *ac),
            other => panic!("expected source, got {other:?}"),
        };
        assert_eq!(src(0), (5.0, None));
        assert_eq!(src(1), (3.0, Some((1.0, 45.0))));
        assert_eq!(src(2), (0.0, Some((2.0, 0.0))));
        assert_eq!(src(3).0, 1e-3);
        assert_eq!(src(4), (0.0, None));
        assert!(matches!(n.components[3], Component::ISource { .. }));
    }

    #[test]
    fn test_waveforms() {
        let n = parse_body(
            "V1 1 0 SIN(0 1 1k)\nV2 2 0 DC 0 PULSE(0 5 1n 2n 3n 10n 20n)\nV3 3 0 sin (1, 2, 50, 0, 0, 90)\n",
        );
        match &n.components[0] {
            Component::VSource { tran, .. } => assert_eq!(
                tran,
                &Some(TransientFunc::Sin {
                    vo: 0.0,
                    va: 1.0,
                    freq: 1e3,
                    td: 0.0,
                    theta: 0.0,
                    phase: 0.0
                })
            ),
            other => panic!("expected source, got {other:?}"),
        }
        match &n.components[1] {
            Component::VSource {
                tran: Some(TransientFunc::Pulse { v2, pw, per, .. }),
                ..
            } => {
                assert_eq!(*v2, 5.0);
                assert_relative_eq!(*pw, 10e-9);
                assert_relative_eq!(*per, 20e-9);
            }
            other => panic!("expected pulse source, got {other:?}"),
        }
        assert!(matches!(
            &n.components[2],
            Component::VSource { tran: Some(TransientFunc::Sin { phase, .. }), .. } if *phase == 90.0
        ));
    }

    #[test]
    fn test_waveform_argument_count_checked() {
        let err = parse("t\nV1 1 0 SIN(1)\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(parse("t\nV1 1 0 PULSE(0 1 2 3 4 5 6 7)\n").is_err());
    }

    #[test]
    fn test_diode_and_model() {
        let n = parse_body("D1 a k dmod IC=0.7\n.model DMOD D(IS=1e-12 N=1.5 TEMP=310)\n.MODEL DX D\n");
        assert_eq!(
            n.components[0],
            Component::Diode {
                name: "D1".into(),
                nodes: ("a".into(), "k".into()),
                model: "DMOD".into(),
                initial_voltage: 0.7
            }
        );
        let m = n.model("DMOD").unwrap();
        assert_relative_eq!(m.is, 1e-12);
        assert_relative_eq!(m.n, 1.5);
        assert_relative_eq!(m.temperature, 310.0);
        let dx = n.model("DX").unwrap();
        assert_relative_eq!(dx.is, DEFAULT_IS);
        // Default emission coefficient pins n*Vt to 25 mV.
        assert_relative_eq!(dx.n_vt(), 0.025, max_relative = 1e-12);
    }

    #[test]
    fn test_unknown_model_parameter_rejected() {
        let err = parse("t\n.MODEL D1 D(BV=5)\n").unwrap_err();
        assert!(err.to_string().contains("BV"));
    }

    #[test]
    fn test_continuation_lines() {
        let n = parse_body("V1 1 0\n+ DC 2\n+ AC 1\n");
        assert!(matches!(
            &n.components[0],
            Component::VSource { dc, ac: Some((mag, _)), .. } if *dc == 2.0 && *mag == 1.0
        ));
    }

    #[test]
    fn test_duplicate_component_replaced_in_place() {
        let n = parse_body("R1 1 0 1k\nR2 1 0 2k\nR1 1 0 5k\n");
        assert_eq!(n.components.len(), 2);
        assert!(matches!(&n.components[0], Component::Resistor { resistance, .. } if *resistance == 5e3));
    }

    // ---- Analyses and outputs ----

    #[test]
    fn test_analysis_commands() {
        let n = parse_body(".OP\n.dc v1 0 5 0.5\n.AC DEC 10 1 1MEG\n.TRAN 1u 1m\n.tran 1n 10n 2n\n");
        assert_eq!(n.analyses[0], Analysis::Op);
        assert_eq!(
            n.analyses[1],
            Analysis::Dc {
                source_kind: SweepSourceKind::Voltage,
                source: "V1".into(),
                start: 0.0,
                stop: 5.0,
                increment: 0.5
            }
        );
        assert_eq!(
            n.analyses[2],
            Analysis::Ac {
                sweep_type: AcSweepType::Dec,
                n_points: 10,
                f_start: 1.0,
                f_stop: 1e6
            }
        );
        assert!(matches!(n.analyses[3], Analysis::Tran { tstart, .. } if tstart == 0.0));
        assert!(matches!(n.analyses[4], Analysis::Tran { tstart, .. } if tstart == 2e-9));
    }

    #[test]
    fn test_dc_sweep_of_current_source() {
        let n = parse_body(".DC I1 0 1m 0.1m\n");
        assert!(matches!(
            &n.analyses[0],
            Analysis::Dc { source_kind: SweepSourceKind::Current, .. }
        ));
        assert!(parse("t\n.DC R1 0 1 0.1\n").is_err());
    }

    #[test]
    fn test_output_requests() {
        let n = parse_body(".PRINT AC VDB(out) vp(a,b) I(v1)\n.plot tran V(1) IM(L1)\n");
        let print = &n.outputs[0];
        assert_eq!(print.kind, OutputKind::Print);
        assert_eq!(print.analysis, AnalysisKind::Ac);
        assert_eq!(
            print.variables,
            vec![
                Variable {
                    quantity: Quantity::Voltage,
                    transform: Transform::Db,
                    targets: vec!["out".into()]
                },
                Variable {
                    quantity: Quantity::Voltage,
                    transform: Transform::Phase,
                    targets: vec!["a".into(), "b".into()]
                },
                Variable {
                    quantity: Quantity::Current,
                    transform: Transform::Mag,
                    targets: vec!["V1".into()]
                },
            ]
        );
        let plot = &n.outputs[1];
        assert_eq!(plot.kind, OutputKind::Plot);
        assert_eq!(plot.analysis, AnalysisKind::Tran);
        assert_eq!(plot.variables[1].transform, Transform::Mag);
    }

    #[test]
    fn test_bad_output_variables() {
        assert!(parse("t\n.PRINT DC X(1)\n").is_err());
        assert!(parse("t\n.PRINT DC I(a,b)\n").is_err());
        assert!(parse("t\n.PRINT DC\n").is_err());
    }

    #[test]
    fn test_unsupported_dot_command_ignored() {
        let n = parse_body(".OPTIONS RELTOL=1e-4\nR1 1 0 1\n");
        assert!(n.analyses.is_empty());
        assert_eq!(n.components.len(), 1);
    }

    // ---- Errors ----

    #[test]
    fn test_parse_error_reports_line_number() {
        let err = parse("title\nR1 1 0 1k\nR2 1 0 abc\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Parse error: line 3"), "{msg}");
    }

    #[test]
    fn test_unknown_element_rejected() {
        let err = parse("title\nQ1 1 2 3 npn\n").unwrap_err();
        assert!(err.to_string().contains("unknown element 'Q'"));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(parse("title\nR1 1 0 1k 2k\n").is_err());
        assert!(parse("title\n.TRAN 1u 1m 0 5\n").is_err());
    }
}
