use clap::{Arg, Command};
use std::io::{self, Write};

const FORM_TYPES: [&str; 8] = ["10-K", "10-Q", "8-K", "4", "S-1", "13F-HR", "DEF 14A", "SC 13G"];
const EXTENSIONS: [&str; 3] = ["txt", "htm", "xml"];

fn main() -> anyhow::Result<()> {
    let matches = Command::new("gen")
        .about("Write a synthetic EDGAR master index to stdout")
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(u64))
                .required(true),
        )
        .arg(
            Arg::new("companies")
                .long("companies")
                .value_parser(clap::value_parser!(u64))
                .default_value("5000"),
        )
        .arg(
            Arg::new("bad_every")
                .long("bad-every")
                .help("Emit a row with an unparsable path every N rows (0 = never)")
                .value_parser(clap::value_parser!(u64))
                .default_value("0"),
        )
        .arg(Arg::new("date").long("date").default_value("20240115"))
        .get_matches();

    let rows: u64 = *matches.get_one("rows").unwrap();
    let companies: u64 = (*matches.get_one::<u64>("companies").unwrap()).max(1);
    let bad_every: u64 = *matches.get_one("bad_every").unwrap();
    let date = matches.get_one::<String>("date").unwrap();
    anyhow::ensure!(
        date.len() == 8 && date.bytes().all(|b| b.is_ascii_digit()),
        "--date must be YYYYMMDD"
    );

    let mut out = io::BufWriter::new(io::stdout().lock());

    writeln!(&mut out, "Description:           Master Index of EDGAR Dissemination Feed")?;
    writeln!(&mut out, "Last Data Received:    synthetic")?;
    writeln!(&mut out, "Comments:              generated")?;
    writeln!(&mut out)?;
    writeln!(&mut out)?;
    writeln!(&mut out, "CIK|Company Name|Form Type|Date Filed|Filename")?;
    writeln!(&mut out, "{}", "-".repeat(80))?;

    // Deterministic data: cik cycles through the company pool
    for i in 0..rows {
        let cik = 1_000_000 + (i % companies);
        let form = FORM_TYPES[(i % FORM_TYPES.len() as u64) as usize];
        let ext = EXTENSIONS[(i % EXTENSIONS.len() as u64) as usize];
        if bad_every > 0 && i % bad_every == bad_every - 1 {
            writeln!(
                &mut out,
                "{cik}|COMPANY {cik} INC|{form}|{date}|edgar/data/{cik}/badfile.{ext}"
            )?;
        } else {
            writeln!(
                &mut out,
                "{cik}|COMPANY {cik} INC|{form}|{date}|edgar/data/{cik}/{:010}-{}-{:06}.{ext}",
                cik,
                &date[2..4],
                i % 1_000_000
            )?;
        }
        if i % 10_000 == 0 {
            out.flush()?;
        } // keep buffers moving on huge runs
    }

    out.flush()?;
    Ok(())
}
