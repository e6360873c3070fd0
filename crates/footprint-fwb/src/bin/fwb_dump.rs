//! Print a human-readable listing of an FWB document.
//!
//! Usage: `fwb_dump <file.fwb> [--sheet NAME]`

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use footprint_fwb::{decode, FwbDocument, FwbSheet};
use footprint_model::{display_formula_text, errors::error_display, CellValue};

#[derive(Debug)]
struct Args {
    path: PathBuf,
    sheet: Option<String>,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let mut path: Option<PathBuf> = None;
        let mut sheet: Option<String> = None;

        let mut it = env::args().skip(1);
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "-h" | "--help" => {
                    print_usage();
                    std::process::exit(0);
                }
                "--sheet" => {
                    sheet = Some(it.next().ok_or("--sheet expects a sheet name")?);
                }
                _ if path.is_none() => path = Some(PathBuf::from(arg)),
                _ => return Err(format!("unexpected argument: {arg}")),
            }
        }

        Ok(Self {
            path: path.ok_or("missing <file.fwb> argument")?,
            sheet,
        })
    }
}

fn print_usage() {
    eprintln!("usage: fwb_dump <file.fwb> [--sheet NAME]");
}

fn main() -> ExitCode {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("error: {msg}");
            print_usage();
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let bytes = std::fs::read(&args.path)
        .map_err(|e| format!("cannot read {}: {e}", args.path.display()))?;
    let doc = decode(&bytes).map_err(|e| format!("cannot decode {}: {e}", args.path.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    dump(&mut out, &doc, args.sheet.as_deref()).map_err(|e| format!("write failed: {e}"))
}

fn dump(out: &mut impl Write, doc: &FwbDocument, only: Option<&str>) -> io::Result<()> {
    for name in &doc.names {
        match &name.scope {
            None => writeln!(out, "name {} = {}", name.name, name.expr)?,
            Some(sheet) => writeln!(out, "name {}!{} = {}", sheet, name.name, name.expr)?,
        }
    }

    for sheet in &doc.sheets {
        if only.is_some_and(|want| want != sheet.name) {
            continue;
        }
        dump_sheet(out, sheet)?;
    }

    let passthrough: usize = doc.extras.len()
        + doc
            .sheets
            .iter()
            .map(|s| {
                s.leading_extras.len()
                    + s.rows.values().map(|r| r.extras.len()).sum::<usize>()
            })
            .sum::<usize>();
    if passthrough > 0 {
        writeln!(out, "({passthrough} passthrough records)")?;
    }
    Ok(())
}

fn dump_sheet(out: &mut impl Write, sheet: &FwbSheet) -> io::Result<()> {
    writeln!(
        out,
        "sheet {:?}: {} rows, {} cells",
        sheet.name,
        sheet.rows.len(),
        sheet.cell_count()
    )?;
    for (at, cell) in sheet.iter_cells() {
        write!(out, "  {} = {}", at, render_value(&cell.value))?;
        if let Some(formula) = &cell.formula {
            write!(out, "  {}", display_formula_text(formula))?;
        }
        if let Some(comment) = &cell.comment {
            write!(out, "  // {comment}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn render_value(value: &CellValue) -> String {
    match value {
        CellValue::Empty => "(blank)".to_string(),
        CellValue::Number(n) => n.to_string(),
        CellValue::Text(s) => format!("{s:?}"),
        CellValue::Boolean(b) => b.to_string().to_uppercase(),
        CellValue::Error(code) => error_display(*code),
        CellValue::Date(serial) => match footprint_model::date_from_serial(*serial) {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => format!("(date serial {serial})"),
        },
    }
}
