//! `pgjsonl` - move PostgreSQL table data to and from JSONL files.
//!
//! Exits 0 when every table succeeded and 1 otherwise.

use pgjsonl::run;

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
