use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use coldb::{Database, Outcome};

/// Interactive shell for a file-backed columnar database
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding every database
    #[arg(short, long, env = "COLDB_ROOT", default_value = "Databases")]
    root: PathBuf,

    /// Database to select at start-up
    #[arg(short, long)]
    database: Option<String>,

    /// Print query results as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut db = match Database::open(&args.root) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(name) = &args.database
        && let Err(e) = db.change_database(name)
    {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match repl(&mut db, args.json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to read input: {e}");
            ExitCode::FAILURE
        }
    }
}

fn repl(db: &mut Database, json: bool) -> io::Result<()> {
    println!("coldb shell (end statements with ';', type 'exit;' or '.exit' to stop)");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut buffer = String::new();
    loop {
        if buffer.is_empty() {
            match db.current() {
                Some(name) => print!("{name}> "),
                None => print!("coldb> "),
            }
        } else {
            print!("   ...> ");
        }
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            // end of input
            return Ok(());
        };
        let line = line?;
        let trimmed = line.trim();
        if buffer.is_empty() && (trimmed == ".exit" || trimmed.eq_ignore_ascii_case("exit;")) {
            return Ok(());
        }
        if trimmed.is_empty() {
            continue;
        }

        buffer.push_str(&line);
        buffer.push('\n');
        if !trimmed.ends_with(';') {
            continue;
        }

        let sql = std::mem::take(&mut buffer);
        match db.execute(&sql) {
            Ok(Outcome::Rows(result)) if json => {
                match serde_json::to_string_pretty(&result.to_json()) {
                    Ok(text) => println!("{text}"),
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            Ok(outcome) => println!("{outcome}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}
