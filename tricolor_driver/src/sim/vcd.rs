//! Value-change dump and GTKWave save-file writers.
//!
//! Output is a pure function of the trace: no dates, no host names, so two
//! identical runs produce byte-identical files.

use std::io::{self, Write};
use std::path::Path;

use super::Trace;

/// Short VCD identifier for the `index`-th variable, using the printable
/// ASCII range `!`..=`~`.
fn identifier(mut index: usize) -> String {
    const FIRST: u8 = b'!';
    const RADIX: usize = (b'~' - b'!' + 1) as usize;
    let mut id = String::new();
    loop {
        id.push(char::from(FIRST + (index % RADIX) as u8));
        index /= RADIX;
        if index == 0 {
            break;
        }
        index -= 1;
    }
    id
}

fn value_change(value: u64, width: u32, id: &str) -> String {
    if width == 1 {
        format!("{}{id}", value & 1)
    } else {
        format!("b{value:b} {id}")
    }
}

/// Stream the trace as a VCD document with a 1 ps timescale. Edges are
/// written from the change log, so the trace is never expanded in memory.
pub fn write_vcd<W: Write + ?Sized>(trace: &Trace, out: &mut W) -> io::Result<()> {
    let clock_id = identifier(0);
    let vars: Vec<(String, u32)> = trace
        .signals()
        .iter()
        .enumerate()
        .map(|(i, (_, width))| (identifier(i + 1), *width))
        .collect();

    writeln!(out, "$version tricolor $end")?;
    writeln!(out, "$timescale 1ps $end")?;
    writeln!(out, "$scope module {} $end", trace.design())?;
    writeln!(out, "$var wire 1 {clock_id} {} $end", trace.clock())?;
    for ((id, width), (name, _)) in vars.iter().zip(trace.signals()) {
        writeln!(out, "$var wire {width} {id} {name} $end")?;
    }
    writeln!(out, "$upscope $end")?;
    writeln!(out, "$enddefinitions $end")?;

    writeln!(out, "#0")?;
    writeln!(out, "$dumpvars")?;
    writeln!(out, "0{clock_id}")?;
    for ((id, width), value) in vars.iter().zip(trace.initial()) {
        writeln!(out, "{}", value_change(*value, *width, id))?;
    }
    writeln!(out, "$end")?;

    let mut changes = trace.changes().iter().peekable();
    for edge in 1..=trace.edges() {
        let rise = trace.rise_time(edge);
        writeln!(out, "#{rise}")?;
        writeln!(out, "1{clock_id}")?;
        while let Some(change) = changes.next_if(|c| c.edge == edge) {
            let (id, width) = &vars[change.signal];
            writeln!(out, "{}", value_change(change.value, *width, id))?;
        }
        writeln!(out, "#{}", rise + trace.half_period_ps())?;
        writeln!(out, "0{clock_id}")?;
    }
    Ok(())
}

/// Render the whole VCD document in memory.
pub fn vcd_trace(trace: &Trace) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_vcd(trace, &mut out);
    String::from_utf8_lossy(&out).into_owned()
}

/// GTKWave save file listing every traced signal in order.
pub fn gtkw_layout(trace: &Trace, dumpfile: &Path) -> String {
    let mut out = vec![
        "[*]".to_string(),
        "[*] tricolor simulation layout".to_string(),
        "[*]".to_string(),
        format!("[dumpfile] \"{}\"", dumpfile.display()),
        "[timestart] 0".to_string(),
        "@28".to_string(),
        format!("{}.{}", trace.design(), trace.clock()),
    ];
    for (name, width) in trace.signals() {
        if *width > 1 {
            out.push("@22".to_string());
            out.push(format!("{}.{}[{}:0]", trace.design(), name, width - 1));
        } else {
            out.push("@28".to_string());
            out.push(format!("{}.{}", trace.design(), name));
        }
    }
    out.push(String::new());
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn identifiers_are_unique_and_printable() {
        let ids: Vec<_> = (0..500).map(identifier).collect();
        assert_eq!(ids[0], "!");
        assert_eq!(ids[93], "~");
        assert_eq!(ids[94], "!!");
        assert!(ids.iter().all_unique());
        assert!(ids.iter().flat_map(|s| s.bytes()).all(|b| (b'!'..=b'~').contains(&b)));
    }

    #[test]
    fn vector_and_scalar_changes() {
        assert_eq!(value_change(1, 1, "!"), "1!");
        assert_eq!(value_change(2, 2, "\""), "b10 \"");
    }
}
